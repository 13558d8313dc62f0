//! In-memory runtime used by unit tests.
//!
//! Module "sources" live in a shared [`FakeSources`] table that tests edit to
//! simulate authors changing scripts on disk. Every bridge call asserts the
//! execution lock is held and handler calls are journaled.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Serialize;

use super::{ArgVisitor, ExecutionLock, ScriptArgs, ScriptRuntime};
use crate::error::{ScriptError, ScriptFailure};

/// What a fake module defines
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeScript {
    pub handlers: HashSet<String>,
    pub raising: HashSet<String>,
    pub broken: bool,
}

impl FakeScript {
    pub fn with_handlers(handlers: &[&str]) -> Self {
        Self {
            handlers: handlers.iter().map(|h| h.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn raising(mut self, handler: &str) -> Self {
        self.handlers.insert(handler.to_string());
        self.raising.insert(handler.to_string());
        self
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeSources(Rc<RefCell<HashMap<String, FakeScript>>>);

impl FakeSources {
    pub fn define(&self, name: &str, script: FakeScript) {
        self.0.borrow_mut().insert(name.to_string(), script);
    }

    fn get(&self, name: &str) -> Option<FakeScript> {
        self.0.borrow().get(name).cloned()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Call {
    pub module: String,
    pub event: String,
    pub args: Vec<toml::Value>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Journal(Rc<RefCell<Vec<Call>>>);

impl Journal {
    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().clone()
    }

    /// Module names in call order
    pub fn modules(&self) -> Vec<String> {
        self.0.borrow().iter().map(|c| c.module.clone()).collect()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

#[derive(Debug)]
pub(crate) struct FakeModule {
    id: u64,
    name: String,
}

#[derive(Debug)]
pub(crate) struct FakeRuntime {
    lock: ExecutionLock,
    sources: FakeSources,
    live: HashMap<u64, FakeScript>,
    next_id: u64,
    journal: Journal,
    pub search_path: Vec<PathBuf>,
    pub released: Rc<RefCell<Vec<String>>>,
}

impl FakeRuntime {
    pub fn new(sources: FakeSources) -> Self {
        Self {
            lock: ExecutionLock::new(),
            sources,
            live: HashMap::new(),
            next_id: 0,
            journal: Journal::default(),
            search_path: Vec::new(),
            released: Rc::default(),
        }
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    fn assert_locked(&self, operation: &str) {
        assert!(
            self.lock.is_held_by_current_thread(),
            "{} issued without holding the execution lock",
            operation
        );
    }

    fn syntax_error(name: &str) -> ScriptError {
        ScriptFailure::new(format!("{}.fake:1: unexpected symbol", name)).into()
    }
}

struct Collect(Vec<toml::Value>);

impl ArgVisitor for Collect {
    fn visit<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ScriptError> {
        let value =
            toml::Value::try_from(value).map_err(|e| ScriptError::Marshal(e.to_string()))?;
        self.0.push(value);
        Ok(())
    }
}

impl ScriptRuntime for FakeRuntime {
    type Module = FakeModule;

    const SCRIPT_EXTENSION: &'static str = "fake";

    fn execution_lock(&self) -> &ExecutionLock {
        &self.lock
    }

    fn import(&mut self, name: &str, search_dir: &Path) -> Result<FakeModule, ScriptError> {
        self.assert_locked("import");
        self.search_path.push(search_dir.to_path_buf());

        let script = self.sources.get(name).ok_or_else(|| ScriptError::NotFound {
            name: name.to_string(),
            search_path: self.search_path.clone(),
        })?;
        if script.broken {
            return Err(Self::syntax_error(name));
        }

        let id = self.next_id;
        self.next_id += 1;
        self.live.insert(id, script);
        Ok(FakeModule {
            id,
            name: name.to_string(),
        })
    }

    fn reload(&mut self, module: &FakeModule) -> Result<(), ScriptError> {
        self.assert_locked("reload");

        let script = self.sources.get(&module.name).unwrap_or_default();
        if script.broken {
            return Err(Self::syntax_error(&module.name));
        }
        self.live.insert(module.id, script);
        Ok(())
    }

    fn has_attribute(&self, module: &FakeModule, name: &str) -> bool {
        self.assert_locked("has_attribute");
        self.live
            .get(&module.id)
            .is_some_and(|script| script.handlers.contains(name))
    }

    fn invoke<A: ScriptArgs + ?Sized>(
        &self,
        module: &FakeModule,
        name: &str,
        args: &A,
    ) -> Result<(), ScriptError> {
        self.assert_locked("invoke");

        let mut collected = Collect(Vec::new());
        args.forward(&mut collected)?;
        self.journal.0.borrow_mut().push(Call {
            module: module.name.clone(),
            event: name.to_string(),
            args: collected.0,
        });

        let script = self.live.get(&module.id).cloned().unwrap_or_default();
        if script.raising.contains(name) {
            return Err(ScriptFailure::new(format!("{} raised in {}", name, module.name))
                .with_traceback(format!(
                    "Traceback (most recent call last):\n  {}.fake, in {}",
                    module.name, name
                ))
                .into());
        }
        Ok(())
    }

    fn release(&mut self, module: FakeModule) {
        self.assert_locked("release");
        self.live.remove(&module.id);
        self.released.borrow_mut().push(module.name);
    }
}
