//! Host for game-server scripts written in an embedded language
//!
//! Scripts are plain files in a directory tree. Each one is imported as a
//! module named after its file stem, and may define handler functions named
//! after events (`on_tick`, `on_join`, ...). The server calls
//! [`ScriptHost::dispatch_event`] and every module defining a matching handler
//! is invoked. Which modules handle which events is learned lazily and kept
//! in a cache that loads and reloads maintain.
//!
//! All runtime access goes through [`ScriptRuntime`]; [`LuaRuntime`] is the
//! bundled implementation.
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod host;
mod loader;
pub mod record;
pub mod registry;
pub mod runtime;

#[cfg(test)]
mod testing;

pub use cache::FunctionCache;
pub use config::{ModuleConfig, ScriptingConfig};
pub use dispatch::DispatchReport;
pub use error::{LockTimeout, ScriptError, ScriptFailure};
pub use host::ScriptHost;
pub use record::ModuleRecord;
pub use registry::ModuleRegistry;
pub use runtime::{
    ArgVisitor, ExecutionGuard, ExecutionLock, LuaModule, LuaRuntime, ScriptArgs, ScriptRuntime,
};

/// A host backed by the bundled Lua runtime
pub type LuaScriptHost = ScriptHost<LuaRuntime>;
