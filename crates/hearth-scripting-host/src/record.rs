use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// In-memory descriptor of one loaded script module
#[derive(Debug)]
pub struct ModuleRecord<M> {
    /// Logical name, taken from the file stem
    name: String,
    /// Canonical location of the script
    absolute_path: PathBuf,
    /// Location relative to the working directory at load time (informational)
    relative_path: PathBuf,
    /// Runtime handle, owned by this record
    handle: M,
    loaded_at: SystemTime,
    /// Number of successful in-place reloads
    generation: u32,
}

impl<M> ModuleRecord<M> {
    pub fn new(name: String, absolute_path: PathBuf, relative_path: PathBuf, handle: M) -> Self {
        Self {
            name,
            absolute_path,
            relative_path,
            handle,
            loaded_at: SystemTime::now(),
            generation: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn absolute_path(&self) -> &Path {
        &self.absolute_path
    }

    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    pub fn handle(&self) -> &M {
        &self.handle
    }

    pub fn loaded_at(&self) -> SystemTime {
        self.loaded_at
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Note a successful in-place reload
    pub(crate) fn mark_reloaded(&mut self) {
        self.loaded_at = SystemTime::now();
        self.generation += 1;
    }

    pub(crate) fn into_handle(self) -> M {
        self.handle
    }
}
