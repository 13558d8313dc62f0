use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::error;

/// Marker the interpreter places in front of a stack trace inside an error report
const TRACEBACK_MARKER: &str = "stack traceback:";

/// A script-level failure: what went wrong and, when the runtime captured one, where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFailure {
    /// Printable error message
    pub message: String,
    /// Printable stack trace, if the runtime produced one
    pub traceback: Option<String>,
}

impl ScriptFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            traceback: None,
        }
    }

    pub fn with_traceback(mut self, traceback: impl Into<String>) -> Self {
        self.traceback = Some(traceback.into());
        self
    }

    /// Split a raw interpreter report into its message and `stack traceback:` section.
    pub fn from_report(report: &str) -> Self {
        match report.find(TRACEBACK_MARKER) {
            Some(at) => {
                let message = report[..at].trim_end().to_string();
                let traceback = report[at..].trim_end().to_string();
                Self {
                    message,
                    traceback: Some(traceback),
                }
            }
            None => Self::new(report.trim_end()),
        }
    }
}

impl fmt::Display for ScriptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// The execution lock could not be acquired in time. This is the only error
/// that escapes the host's public operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("scripting runtime lock not acquired within {0:?}")]
pub struct LockTimeout(pub Duration);

/// Errors raised by a scripting runtime bridge.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("module `{name}` not found in search path ({} entries)", .search_path.len())]
    NotFound {
        name: String,
        search_path: Vec<PathBuf>,
    },

    #[error("{0}")]
    Script(ScriptFailure),

    #[error("failed to marshal handler argument: {0}")]
    Marshal(String),

    #[error(transparent)]
    Lock(#[from] LockTimeout),
}

impl ScriptError {
    /// The stack trace attached to a script failure, if any
    pub fn traceback(&self) -> Option<&str> {
        match self {
            ScriptError::Script(failure) => failure.traceback.as_deref(),
            _ => None,
        }
    }
}

impl From<ScriptFailure> for ScriptError {
    fn from(failure: ScriptFailure) -> Self {
        ScriptError::Script(failure)
    }
}

/// Log a failed runtime operation together with its trace.
pub(crate) fn log_script_error(operation: &str, module: &str, err: &ScriptError) {
    match err.traceback() {
        Some(traceback) => error!(
            target: "scripting",
            "{} failed for module {}: {}\nTrace:\n{}",
            operation,
            module,
            err,
            traceback
        ),
        None => error!(
            target: "scripting",
            "{} failed for module {}: {}",
            operation,
            module,
            err
        ),
    }
}
