use std::io;

use hearth_scripting_host::LockTimeout;
use thiserror::Error;

/// Reasons the server loop stops early
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Lock(#[from] LockTimeout),
    #[error("Failed to write console output: {0}")]
    Io(#[from] io::Error),
}
