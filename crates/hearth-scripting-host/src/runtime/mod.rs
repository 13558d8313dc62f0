//! The bridge between the host and an embedded scripting runtime.

mod args;
mod lock;
mod lua;

#[cfg(test)]
pub(crate) mod fake;

use std::path::Path;

pub use args::{ArgVisitor, ScriptArgs};
pub use lock::{ExecutionGuard, ExecutionLock};
pub use lua::{LuaModule, LuaRuntime};

use crate::error::ScriptError;

/// The only component that talks to the foreign runtime.
///
/// Every method except [`ScriptRuntime::execution_lock`] and
/// [`ScriptRuntime::lock_scope`] must be called with the execution lock held
/// by the current thread.
pub trait ScriptRuntime {
    /// Opaque handle to an imported module, owned by its module record
    type Module;

    /// File extension (without the dot) identifying script files
    const SCRIPT_EXTENSION: &'static str;

    /// The lock serialising all access to this runtime
    fn execution_lock(&self) -> &ExecutionLock;

    /// Acquire the execution lock for the lifetime of the returned guard
    fn lock_scope(&self) -> ExecutionGuard<'_> {
        self.execution_lock().acquire()
    }

    /// Put `search_dir` on the module search path and import `name` from it
    fn import(&mut self, name: &str, search_dir: &Path) -> Result<Self::Module, ScriptError>;

    /// Re-execute a module's top-level body inside its existing namespace
    fn reload(&mut self, module: &Self::Module) -> Result<(), ScriptError>;

    /// Whether the module defines an attribute called `name`. Never fails.
    fn has_attribute(&self, module: &Self::Module, name: &str) -> bool;

    /// Call the module's `name` attribute with `args`; the result is discarded
    fn invoke<A: ScriptArgs + ?Sized>(
        &self,
        module: &Self::Module,
        name: &str,
        args: &A,
    ) -> Result<(), ScriptError>;

    /// Free the runtime-side resources behind a module handle
    fn release(&mut self, module: Self::Module);
}
