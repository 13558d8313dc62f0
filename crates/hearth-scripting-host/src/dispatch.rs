use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::error::{log_script_error, LockTimeout};
use crate::host::ScriptHost;
use crate::record::ModuleRecord;
use crate::runtime::{ScriptArgs, ScriptRuntime};

/// What a single [`ScriptHost::dispatch_event`] call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers called, including the ones that failed
    pub invoked: usize,
    /// Handlers that returned an error
    pub failed: usize,
    /// Cached subscribers whose handler has disappeared
    pub skipped: usize,
    /// Whether the event was resolved by scanning every module
    pub scanned: bool,
}

impl<R: ScriptRuntime> ScriptHost<R> {
    /// Call the `event` handler of every module defining one, passing `args`.
    ///
    /// The first dispatch of an event scans all modules and remembers which
    /// ones handled it; later dispatches only visit those. Handler errors are
    /// logged and do not stop the remaining handlers.
    pub fn dispatch_event<A: ScriptArgs>(
        &mut self,
        event: &str,
        args: A,
    ) -> Result<DispatchReport, LockTimeout> {
        let lock = self.lock.clone();
        let _guard = lock.acquire_timeout(self.config.lock_timeout())?;

        trace!(target: "scripting", "Dispatching event {}", event);

        if let Some(modules) = self.cache.lookup(event) {
            return Ok(self.dispatch_cached(event, modules, &args));
        }
        Ok(self.dispatch_scan(event, &args))
    }

    fn dispatch_cached<A: ScriptArgs>(
        &self,
        event: &str,
        modules: &[String],
        args: &A,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        for name in modules {
            let Some(record) = self.registry.find(name) else {
                warn!(
                    target: "scripting",
                    "Cached module {} for event {} is no longer loaded",
                    name,
                    event
                );
                report.skipped += 1;
                continue;
            };

            if !self.runtime.has_attribute(record.handle(), event) {
                debug!(
                    target: "scripting",
                    "Module {} no longer handles {}, skipping",
                    name,
                    event
                );
                report.skipped += 1;
                continue;
            }

            self.invoke_handler(record, event, args, &mut report);
        }

        report
    }

    fn dispatch_scan<A: ScriptArgs>(&mut self, event: &str, args: &A) -> DispatchReport {
        let mut report = DispatchReport {
            scanned: true,
            ..DispatchReport::default()
        };

        let mut subscribers = Vec::new();
        for record in self.registry.iter() {
            if self.runtime.has_attribute(record.handle(), event) {
                // A handler that fails is still a subscriber
                self.invoke_handler(record, event, args, &mut report);
                subscribers.push(record.name().to_string());
            }
        }

        if subscribers.is_empty() {
            trace!(target: "scripting", "No handlers for event {}", event);
        } else {
            self.cache.record_resolution(event, subscribers);
        }

        report
    }

    fn invoke_handler<A: ScriptArgs>(
        &self,
        record: &ModuleRecord<R::Module>,
        event: &str,
        args: &A,
        report: &mut DispatchReport,
    ) {
        let started = Instant::now();
        let result = self.runtime.invoke(record.handle(), event, args);
        let elapsed = started.elapsed();

        report.invoked += 1;

        if let Some(threshold) = self.config.slow_handler_threshold() {
            if elapsed >= threshold {
                warn!(
                    target: "scripting",
                    "Handler {} in module {} took {:?}",
                    event,
                    record.name(),
                    elapsed
                );
            }
        }

        if let Err(e) = result {
            report.failed += 1;
            log_script_error(&format!("Handler {}", event), record.name(), &e);
        }
    }
}
