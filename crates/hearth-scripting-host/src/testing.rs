//! Fixtures shared by the unit tests: a scratch script directory backed by the
//! fake runtime, and log capture.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;

use crate::config::ScriptingConfig;
use crate::host::ScriptHost;
use crate::runtime::fake::{FakeRuntime, FakeScript, FakeSources};
use crate::runtime::ScriptRuntime;

#[derive(Clone, Default)]
pub(crate) struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut bytes) = self.0.lock() {
            bytes.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` with a subscriber capturing everything logged on this thread
pub(crate) fn capture_logs(f: impl FnOnce()) -> String {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    buffer.contents()
}

/// A temporary script directory whose files are backed by [`FakeSources`]
pub(crate) struct ScriptTree {
    dir: TempDir,
    sources: FakeSources,
}

impl ScriptTree {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            sources: FakeSources::default(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Create `<name>.fake` at the top of the tree
    pub fn add(&self, name: &str, script: FakeScript) -> PathBuf {
        self.add_at("", name, script)
    }

    /// Create `<subdir>/<name>.fake`
    pub fn add_at(&self, subdir: &str, name: &str, script: FakeScript) -> PathBuf {
        let dir = self.dir.path().join(subdir);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("{}.{}", name, FakeRuntime::SCRIPT_EXTENSION));
        fs::write(&path, name).unwrap();
        self.sources.define(name, script);
        path
    }

    /// Change what a module defines, as if its author edited the file
    pub fn edit(&self, name: &str, script: FakeScript) {
        self.sources.define(name, script);
    }

    pub fn host(&self) -> ScriptHost<FakeRuntime> {
        self.host_with(ScriptingConfig::default())
    }

    pub fn host_with(&self, config: ScriptingConfig) -> ScriptHost<FakeRuntime> {
        ScriptHost::with_config(FakeRuntime::new(self.sources.clone()), config)
    }
}
