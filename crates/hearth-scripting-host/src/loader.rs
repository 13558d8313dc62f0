use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::error::{log_script_error, LockTimeout};
use crate::host::ScriptHost;
use crate::record::ModuleRecord;
use crate::runtime::ScriptRuntime;

impl<R: ScriptRuntime> ScriptHost<R> {
    /// Import one script file and register it under its file stem.
    ///
    /// A module already registered under the same name is replaced. Import
    /// failures are logged and leave the host unchanged; the return value
    /// says whether the module was loaded.
    pub fn load_script(&mut self, path: impl AsRef<Path>) -> Result<bool, LockTimeout> {
        let lock = self.lock.clone();
        let _guard = lock.acquire_timeout(self.config.lock_timeout())?;

        Ok(self.load_one(path.as_ref()))
    }

    /// Load every script below `dir` (or the configured module path),
    /// descending into subdirectories and following symlinks.
    ///
    /// Relative directories are resolved against the working directory.
    /// Returns the number of modules loaded.
    pub fn load_scripts(&mut self, dir: Option<&Path>) -> Result<usize, LockTimeout> {
        let lock = self.lock.clone();
        let _guard = lock.acquire_timeout(self.config.lock_timeout())?;

        let dir = resolve_against_working_dir(dir.unwrap_or(self.module_path.as_path()));
        if !dir.is_dir() {
            error!(
                target: "scripting",
                "Script directory {} does not exist or is not a directory",
                dir.display()
            );
            return Ok(0);
        }

        let mut scripts = Vec::new();
        let mut visited = HashSet::new();
        collect_scripts(&dir, R::SCRIPT_EXTENSION, &mut visited, &mut scripts);

        info!(
            target: "scripting",
            "Found {} script(s) in {}",
            scripts.len(),
            dir.display()
        );

        let mut loaded = 0;
        for path in scripts {
            let name = module_name(&path).unwrap_or_default();
            if !self.config.is_module_enabled(&name) {
                info!(target: "scripting", "Skipping disabled module {}", name);
                continue;
            }
            if self.load_script(&path)? {
                loaded += 1;
            }
        }

        info!(target: "scripting", "Loaded {} module(s)", loaded);
        Ok(loaded)
    }

    /// Re-execute a loaded module in place and refresh its cache entries.
    ///
    /// The module is dropped from every cached event before reloading, so a
    /// failed reload leaves it registered but unreachable from events it
    /// used to serve.
    pub fn reload_script(&mut self, name: &str) -> Result<bool, LockTimeout> {
        let lock = self.lock.clone();
        let _guard = lock.acquire_timeout(self.config.lock_timeout())?;

        if !self.registry.contains(name) {
            warn!(target: "scripting", "Cannot reload {}: module not loaded", name);
            return Ok(false);
        }

        let removed = self.cache.remove_module(name);
        debug!(
            target: "scripting",
            "Removed module {} from {} cached event(s)",
            name,
            removed
        );

        let Some(record) = self.registry.find_mut(name) else {
            return Ok(false);
        };

        let reloaded = match self.runtime.reload(record.handle()) {
            Ok(()) => {
                record.mark_reloaded();
                let added = self.cache.add_module_to_known_events(record, &self.runtime);
                info!(
                    target: "scripting",
                    "Reloaded module {} (generation {}, {} cached event(s))",
                    name,
                    record.generation(),
                    added
                );
                true
            }
            Err(e) => {
                log_script_error("Reload", name, &e);
                false
            }
        };

        if self.config.evict_empty_entries {
            let evicted = self.cache.evict_empty();
            if !evicted.is_empty() {
                debug!(target: "scripting", "Evicted empty cache entries: {:?}", evicted);
            }
        }

        Ok(reloaded)
    }

    /// Reload every loaded module, in name order. Returns how many succeeded.
    pub fn reload_all(&mut self) -> Result<usize, LockTimeout> {
        let lock = self.lock.clone();
        let _guard = lock.acquire_timeout(self.config.lock_timeout())?;

        let names: Vec<String> = self
            .registry
            .names()
            .into_iter()
            .map(str::to_string)
            .collect();
        info!(target: "scripting", "Reloading {} module(s)", names.len());

        let mut reloaded = 0;
        for name in &names {
            if self.reload_script(name)? {
                reloaded += 1;
            }
        }
        Ok(reloaded)
    }

    fn load_one(&mut self, path: &Path) -> bool {
        let absolute_path = match path.canonicalize() {
            Ok(path) => path,
            Err(e) => {
                error!(
                    target: "scripting",
                    "Failed to resolve script {}: {}",
                    path.display(),
                    e
                );
                return false;
            }
        };

        // Name and search directory come from the path as given, so a
        // symlinked script is known by the link's name
        let given_path = resolve_against_working_dir(path);
        let (Some(name), Some(search_dir)) = (module_name(&given_path), given_path.parent())
        else {
            error!(
                target: "scripting",
                "Cannot derive a module name from {}",
                given_path.display()
            );
            return false;
        };

        let relative_path = relative_to_working_dir(&given_path, &absolute_path);
        debug!(
            target: "scripting",
            "Loading module {} from {}",
            name,
            relative_path.display()
        );

        let handle = match self.runtime.import(&name, search_dir) {
            Ok(handle) => handle,
            Err(e) => {
                log_script_error("Import", &name, &e);
                return false;
            }
        };

        if self.registry.contains(&name) {
            warn!(
                target: "scripting",
                "Module {} is already loaded, replacing it with {}",
                name,
                relative_path.display()
            );
            self.cache.remove_module(&name);
        }

        let record = ModuleRecord::new(name.clone(), absolute_path.clone(), relative_path, handle);
        if let Some(previous) = self.registry.insert(record) {
            self.runtime.release(previous.into_handle());
        }

        if let Some(record) = self.registry.find(&name) {
            let added = self.cache.add_module_to_known_events(record, &self.runtime);
            if added > 0 {
                debug!(
                    target: "scripting",
                    "Added module {} to {} cached event(s)",
                    name,
                    added
                );
            }
        }

        info!(target: "scripting", "Loaded module {}", name);
        true
    }
}

fn module_name(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}

fn resolve_against_working_dir(path: &Path) -> PathBuf {
    match env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

fn relative_to_working_dir(given: &Path, canonical: &Path) -> PathBuf {
    match env::current_dir() {
        Ok(cwd) => relative_to(given, canonical, &cwd),
        Err(_) => canonical.to_path_buf(),
    }
}

/// `given` relative to `dir`, else `canonical` relative to the canonical
/// `dir`, else `canonical` unchanged
fn relative_to(given: &Path, canonical: &Path, dir: &Path) -> PathBuf {
    if let Ok(relative) = given.strip_prefix(dir) {
        return relative.to_path_buf();
    }
    dir.canonicalize()
        .ok()
        .and_then(|dir| canonical.strip_prefix(dir).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| canonical.to_path_buf())
}

/// Depth-first walk collecting regular files with `extension`. Directories
/// are tracked by canonical path so symlink cycles are entered only once.
fn collect_scripts(
    dir: &Path,
    extension: &str,
    visited: &mut HashSet<PathBuf>,
    scripts: &mut Vec<PathBuf>,
) {
    let Ok(canonical) = dir.canonicalize() else {
        return;
    };
    if !visited.insert(canonical) {
        return;
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(
                target: "scripting",
                "Failed to read script directory {}: {}",
                dir.display(),
                e
            );
            return;
        }
    };

    let mut paths: Vec<PathBuf> = entries.flatten().map(|entry| entry.path()).collect();
    paths.sort();

    for path in paths {
        // fs::metadata follows symlinks
        let Ok(metadata) = fs::metadata(&path) else {
            continue;
        };
        if metadata.is_dir() {
            collect_scripts(&path, extension, visited, scripts);
        } else if metadata.is_file()
            && path.extension().and_then(|ext| ext.to_str()) == Some(extension)
        {
            scripts.push(path);
        }
    }
}
