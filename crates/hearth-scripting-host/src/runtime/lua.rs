use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use mlua::{Function, Lua, LuaSerdeExt, MultiValue, RegistryKey, Table, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::{ArgVisitor, ExecutionLock, ScriptArgs, ScriptRuntime};
use crate::error::{ScriptError, ScriptFailure};

/// Metatable slot remembering what a module published to `package.loaded`
const EXPORTS_KEY: &str = "__exports";

/// A Lua script imported as a module.
///
/// The module's namespace is its own environment table; names it does not
/// define fall through to the shared Lua globals.
#[derive(Debug)]
pub struct LuaModule {
    name: String,
    source: PathBuf,
    env: RegistryKey,
}

impl LuaModule {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The file the module was imported from
    pub fn source(&self) -> &Path {
        &self.source
    }
}

/// Embedded Lua 5.4 interpreter guarded by an [`ExecutionLock`].
pub struct LuaRuntime {
    lua: Lua,
    lock: ExecutionLock,
    search_path: Vec<PathBuf>,
}

impl LuaRuntime {
    pub fn new() -> Self {
        Self::with_lock(ExecutionLock::new())
    }

    /// Create a runtime that shares an existing execution lock
    pub fn with_lock(lock: ExecutionLock) -> Self {
        Self {
            lua: Lua::new(),
            lock,
            search_path: Vec::new(),
        }
    }

    /// Directories searched when importing, in lookup order
    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    /// Read a value from a module's namespace, or `None` if the module does not define it.
    pub fn read_global<T: DeserializeOwned>(
        &self,
        module: &LuaModule,
        name: &str,
    ) -> Result<Option<T>, ScriptError> {
        let _guard = self.lock_scope();
        let env: Table = self.lua.registry_value(&module.env)?;
        match env.raw_get::<_, Value>(name)? {
            Value::Nil => Ok(None),
            value => Ok(Some(self.lua.from_value(value)?)),
        }
    }

    fn add_search_dir(&mut self, dir: &Path) -> Result<(), ScriptError> {
        if self.search_path.iter().any(|known| known == dir) {
            return Ok(());
        }

        // Mirror into package.path so scripts can `require` their siblings
        let package: Table = self.lua.globals().get("package")?;
        let path: String = package.get("path")?;
        package.set(
            "path",
            format!("{};{}", path, dir.join("?.lua").display()),
        )?;

        self.search_path.push(dir.to_path_buf());
        Ok(())
    }

    /// Find `name` in `preferred`, then along the search path
    fn resolve(&self, name: &str, preferred: &Path) -> Option<PathBuf> {
        let file_name = format!("{}.{}", name, Self::SCRIPT_EXTENSION);
        std::iter::once(preferred)
            .chain(self.search_path.iter().map(PathBuf::as_path))
            .map(|dir| dir.join(&file_name))
            .find(|candidate| candidate.is_file())
    }

    fn new_environment(&self) -> mlua::Result<Table<'_>> {
        let env = self.lua.create_table()?;
        let meta = self.lua.create_table()?;
        meta.raw_set("__index", self.lua.globals())?;
        env.set_metatable(Some(meta));
        Ok(env)
    }

    fn package_loaded(&self) -> mlua::Result<Table<'_>> {
        let package: Table = self.lua.globals().get("package")?;
        package.get("loaded")
    }

    /// Compile a script file into a chunk bound to `env` without running it
    fn compile<'lua>(
        &'lua self,
        path: &Path,
        env: &Table<'lua>,
    ) -> Result<Function<'lua>, ScriptError> {
        let source = fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let chunk = self
            .lua
            .load(source.trim_start_matches('\u{FEFF}'))
            .set_name(format!("@{}", path.display()))
            .set_environment(env.clone())
            .into_function()?;

        Ok(chunk)
    }

    /// Publish a module to `require`: the table its chunk returned, or its
    /// namespace when it returned something else
    fn export<'lua>(
        &'lua self,
        name: &str,
        env: &Table<'lua>,
        returned: Value<'lua>,
    ) -> mlua::Result<()> {
        let exports = match returned {
            Value::Table(table) => table,
            _ => env.clone(),
        };
        if let Some(meta) = env.get_metatable() {
            meta.raw_set(EXPORTS_KEY, exports.clone())?;
        }
        self.package_loaded()?.raw_set(name, exports)
    }

    fn forget_loaded(&self, name: &str, env: &RegistryKey) -> mlua::Result<()> {
        let env: Table = self.lua.registry_value(env)?;
        let exports = match env.get_metatable() {
            Some(meta) => meta.raw_get::<_, Value>(EXPORTS_KEY)?,
            None => Value::Nil,
        };
        let loaded = self.package_loaded()?;

        // A newer module may have been imported under the same name
        let current = loaded.raw_get::<_, Value>(name)?;
        if current == exports || current == Value::Table(env) {
            loaded.raw_set(name, Value::Nil)?;
        }
        Ok(())
    }
}

impl Default for LuaRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LuaRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LuaRuntime")
            .field("search_path", &self.search_path)
            .finish_non_exhaustive()
    }
}

impl ScriptRuntime for LuaRuntime {
    type Module = LuaModule;

    const SCRIPT_EXTENSION: &'static str = "lua";

    fn execution_lock(&self) -> &ExecutionLock {
        &self.lock
    }

    fn import(&mut self, name: &str, search_dir: &Path) -> Result<LuaModule, ScriptError> {
        debug_assert!(self.lock.is_held_by_current_thread());

        self.add_search_dir(search_dir)?;
        let source = self.resolve(name, search_dir).ok_or_else(|| ScriptError::NotFound {
            name: name.to_string(),
            search_path: self.search_path.clone(),
        })?;

        let env = self.new_environment()?;
        let chunk = self.compile(&source, &env)?;
        let returned: Value = chunk.call(())?;

        self.export(name, &env, returned)?;
        let env = self.lua.create_registry_value(env)?;

        debug!(target: "scripting", "Imported Lua module {} from {}", name, source.display());
        Ok(LuaModule {
            name: name.to_string(),
            source,
            env,
        })
    }

    fn reload(&mut self, module: &LuaModule) -> Result<(), ScriptError> {
        debug_assert!(self.lock.is_held_by_current_thread());

        let env: Table = self.lua.registry_value(&module.env)?;

        // Compile first so a syntax error leaves the namespace untouched
        let chunk = self.compile(&module.source, &env)?;

        let stale = env
            .clone()
            .pairs::<Value, Value>()
            .map(|pair| pair.map(|(key, _)| key))
            .collect::<mlua::Result<Vec<_>>>()?;
        for key in stale {
            env.raw_set(key, Value::Nil)?;
        }

        let returned: Value = chunk.call(())?;
        self.export(&module.name, &env, returned)?;
        Ok(())
    }

    fn has_attribute(&self, module: &LuaModule, name: &str) -> bool {
        debug_assert!(self.lock.is_held_by_current_thread());

        self.lua
            .registry_value::<Table>(&module.env)
            .and_then(|env| env.raw_get::<_, Value>(name))
            .map(|value| !matches!(value, Value::Nil))
            .unwrap_or(false)
    }

    fn invoke<A: ScriptArgs + ?Sized>(
        &self,
        module: &LuaModule,
        name: &str,
        args: &A,
    ) -> Result<(), ScriptError> {
        debug_assert!(self.lock.is_held_by_current_thread());

        let env: Table = self.lua.registry_value(&module.env)?;
        let handler: Function = env.raw_get(name)?;

        let mut marshalled = LuaArgs {
            lua: &self.lua,
            values: Vec::new(),
        };
        args.forward(&mut marshalled)?;

        handler.call::<_, ()>(MultiValue::from_vec(marshalled.values))?;
        Ok(())
    }

    fn release(&mut self, module: LuaModule) {
        debug_assert!(self.lock.is_held_by_current_thread());

        let LuaModule { name, env, .. } = module;
        if let Err(e) = self.forget_loaded(&name, &env) {
            warn!(target: "scripting", "Failed to unregister Lua module {}: {}", name, e);
        }
        if let Err(e) = self.lua.remove_registry_value(env) {
            warn!(target: "scripting", "Failed to release Lua module {}: {}", name, e);
        }
    }
}

/// Marshals host arguments into Lua values through serde
struct LuaArgs<'lua> {
    lua: &'lua Lua,
    values: Vec<Value<'lua>>,
}

impl ArgVisitor for LuaArgs<'_> {
    fn visit<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ScriptError> {
        let value = self
            .lua
            .to_value(value)
            .map_err(|e| ScriptError::Marshal(e.to_string()))?;
        self.values.push(value);
        Ok(())
    }
}

impl From<mlua::Error> for ScriptError {
    fn from(err: mlua::Error) -> Self {
        ScriptError::Script(failure_from_lua(&err))
    }
}

fn failure_from_lua(err: &mlua::Error) -> ScriptFailure {
    match err {
        mlua::Error::SyntaxError { message, .. } => ScriptFailure::new(message.clone()),
        mlua::Error::RuntimeError(report) => ScriptFailure::from_report(report),
        mlua::Error::CallbackError { traceback, cause } => {
            let failure = failure_from_lua(cause);
            if failure.traceback.is_some() {
                failure
            } else {
                failure.with_traceback(traceback.clone())
            }
        }
        other => ScriptFailure::from_report(&other.to_string()),
    }
}
