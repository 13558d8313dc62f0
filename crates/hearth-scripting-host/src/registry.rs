use std::cell::Cell;
use std::collections::HashMap;

use crate::record::ModuleRecord;

/// Loaded modules keyed by logical name
#[derive(Debug)]
pub struct ModuleRegistry<M> {
    modules: HashMap<String, ModuleRecord<M>>,
    /// Number of full traversals, for verifying that warm dispatch avoids scans
    traversals: Cell<usize>,
}

impl<M> ModuleRegistry<M> {
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
            traversals: Cell::new(0),
        }
    }

    /// Add a record, returning the one it replaced if the name was taken
    pub fn insert(&mut self, record: ModuleRecord<M>) -> Option<ModuleRecord<M>> {
        self.modules.insert(record.name().to_string(), record)
    }

    pub fn find(&self, name: &str) -> Option<&ModuleRecord<M>> {
        self.modules.get(name)
    }

    pub(crate) fn find_mut(&mut self, name: &str) -> Option<&mut ModuleRecord<M>> {
        self.modules.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<ModuleRecord<M>> {
        self.modules.remove(name)
    }

    /// Visit every record, in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = &ModuleRecord<M>> {
        self.traversals.set(self.traversals.get() + 1);
        self.modules.values()
    }

    /// Names of all loaded modules, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// How many times [`ModuleRegistry::iter`] has been called
    pub fn traversals(&self) -> usize {
        self.traversals.get()
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = ModuleRecord<M>> + '_ {
        self.modules.drain().map(|(_, record)| record)
    }
}

impl<M> Default for ModuleRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}
