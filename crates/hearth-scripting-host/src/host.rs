use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::cache::FunctionCache;
use crate::config::ScriptingConfig;
use crate::error::LockTimeout;
use crate::registry::ModuleRegistry;
use crate::runtime::{ExecutionLock, ScriptRuntime};

/// Owns the scripting runtime together with the module registry and the
/// function cache built on top of it.
///
/// There is one host per runtime. It is created at startup and passed
/// explicitly to whatever needs to load scripts or dispatch events. Every
/// public operation holds the runtime's execution lock for its duration, and
/// script failures are logged rather than returned: the only error a caller
/// sees is [`LockTimeout`].
pub struct ScriptHost<R: ScriptRuntime> {
    pub(crate) runtime: R,
    pub(crate) lock: ExecutionLock,
    pub(crate) registry: ModuleRegistry<R::Module>,
    pub(crate) cache: FunctionCache,
    pub(crate) module_path: PathBuf,
    pub(crate) config: ScriptingConfig,
}

impl<R: ScriptRuntime> ScriptHost<R> {
    pub fn new(runtime: R) -> Self {
        Self::with_config(runtime, ScriptingConfig::default())
    }

    pub fn with_config(runtime: R, config: ScriptingConfig) -> Self {
        debug!(target: "scripting", "Creating script host");
        let lock = runtime.execution_lock().clone();
        Self {
            runtime,
            lock,
            registry: ModuleRegistry::new(),
            cache: FunctionCache::new(),
            module_path: config.module_path.clone(),
            config,
        }
    }

    /// Set the directory [`ScriptHost::load_scripts`] uses when given none
    pub fn set_module_path(&mut self, path: impl Into<PathBuf>) {
        self.module_path = path.into();
    }

    pub fn module_path(&self) -> &Path {
        &self.module_path
    }

    pub fn registry(&self) -> &ModuleRegistry<R::Module> {
        &self.registry
    }

    pub fn cache(&self) -> &FunctionCache {
        &self.cache
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn config(&self) -> &ScriptingConfig {
        &self.config
    }

    /// Unload a module: forget its cached handlers and release its handle.
    /// Returns false if no module of that name is loaded.
    pub fn evict_script(&mut self, name: &str) -> Result<bool, LockTimeout> {
        let lock = self.lock.clone();
        let _guard = lock.acquire_timeout(self.config.lock_timeout())?;

        let Some(record) = self.registry.remove(name) else {
            warn!(target: "scripting", "Cannot evict {}: module not loaded", name);
            return Ok(false);
        };

        self.cache.remove_module(name);
        self.runtime.release(record.into_handle());
        info!(target: "scripting", "Evicted module {}", name);
        Ok(true)
    }

    /// Forget resolved events that lost all their subscribers, so their next
    /// dispatch rescans the registry. Returns the number of events dropped.
    pub fn evict_empty_events(&mut self) -> Result<usize, LockTimeout> {
        let lock = self.lock.clone();
        let _guard = lock.acquire_timeout(self.config.lock_timeout())?;

        let evicted = self.cache.evict_empty();
        if !evicted.is_empty() {
            debug!(target: "scripting", "Evicted empty cache entries: {:?}", evicted);
        }
        Ok(evicted.len())
    }
}

impl<R: ScriptRuntime> Drop for ScriptHost<R> {
    fn drop(&mut self) {
        let lock = self.lock.clone();
        let _guard = lock.acquire();

        let count = self.registry.len();
        if count > 0 {
            debug!(target: "scripting", "Releasing {} module(s)", count);
        }

        self.cache.clear();
        for record in self.registry.drain() {
            self.runtime.release(record.into_handle());
        }
    }
}
