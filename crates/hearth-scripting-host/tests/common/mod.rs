#![allow(dead_code)]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use hearth_scripting_host::{LuaScriptHost, LuaRuntime};
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;

/// Shared in-memory log sink
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
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

/// Run `f` and return everything it logged
pub fn capture_logs(f: impl FnOnce()) -> String {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    buffer.contents()
}

/// A temporary directory of Lua scripts
pub struct Scripts {
    dir: TempDir,
}

impl Scripts {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write (or overwrite) `<relative>.lua`
    pub fn write(&self, relative: &str, source: &str) -> PathBuf {
        let path = self.dir.path().join(format!("{}.lua", relative));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create script dir");
        }
        fs::write(&path, source).expect("Failed to write script");
        path
    }

    /// A host whose module path is this directory
    pub fn host(&self) -> LuaScriptHost {
        let mut host = LuaScriptHost::new(LuaRuntime::new());
        host.set_module_path(self.root());
        host
    }
}

/// Read a list-valued global from a loaded module
pub fn read_list<T: serde::de::DeserializeOwned>(
    host: &LuaScriptHost,
    module: &str,
    global: &str,
) -> Option<Vec<T>> {
    let record = host.registry().find(module)?;
    host.runtime()
        .read_global(record.handle(), global)
        .expect("Failed to read global")
}
