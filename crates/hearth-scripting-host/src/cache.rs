use std::collections::HashMap;

use tracing::debug;

use crate::record::ModuleRecord;
use crate::runtime::ScriptRuntime;

/// Maps an event name to the modules known to handle it, in invocation order.
///
/// A key is only present once the event has been resolved by a registry scan
/// that found at least one handler. Entries reference modules by name; every
/// name in the cache is also a key in the registry.
#[derive(Debug, Default)]
pub struct FunctionCache {
    entries: HashMap<String, Vec<String>>,
}

impl FunctionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Modules subscribed to `event`, or `None` if the event is unresolved
    pub fn lookup(&self, event: &str) -> Option<&[String]> {
        self.entries.get(event).map(Vec::as_slice)
    }

    /// Store the result of a registry scan. Empty results are not stored.
    pub fn record_resolution(&mut self, event: &str, modules: Vec<String>) -> bool {
        if modules.is_empty() {
            return false;
        }
        debug!(
            target: "scripting",
            "Creating function cache for event {} ({} module(s))",
            event,
            modules.len()
        );
        self.entries.insert(event.to_string(), modules);
        true
    }

    /// Remove a module from every entry, keeping the keys. Returns the number
    /// of entries it was removed from.
    pub fn remove_module(&mut self, name: &str) -> usize {
        let mut removed = 0;
        for modules in self.entries.values_mut() {
            if let Some(at) = modules.iter().position(|module| module == name) {
                modules.remove(at);
                removed += 1;
            }
        }
        removed
    }

    /// Append `record` to every resolved event its module now handles.
    /// Returns the number of entries it was added to.
    pub fn add_module_to_known_events<R: ScriptRuntime>(
        &mut self,
        record: &ModuleRecord<R::Module>,
        runtime: &R,
    ) -> usize {
        let mut added = 0;
        for (event, modules) in self.entries.iter_mut() {
            if modules.iter().any(|module| module == record.name()) {
                continue;
            }
            if runtime.has_attribute(record.handle(), event) {
                modules.push(record.name().to_string());
                added += 1;
            }
        }
        added
    }

    /// Drop resolved events that no longer have any subscriber, so the next
    /// dispatch scans the registry again. Returns the evicted event names.
    pub fn evict_empty(&mut self) -> Vec<String> {
        let empty: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, modules)| modules.is_empty())
            .map(|(event, _)| event.clone())
            .collect();
        for event in &empty {
            self.entries.remove(event);
        }
        empty
    }

    /// Whether `module` is listed under `event`
    pub fn contains(&self, event: &str, module: &str) -> bool {
        self.lookup(event)
            .is_some_and(|modules| modules.iter().any(|m| m == module))
    }

    /// Resolved event names, sorted
    pub fn events(&self) -> Vec<&str> {
        let mut events: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        events.sort_unstable();
        events
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
