mod config;
mod console;
mod error;
pub mod logging;
mod reload;
mod server_loop;

pub use config::{ConfigLoadError, HearthConfig};
pub use console::{execute, ConsoleCommand, ParseCommandError};
pub use error::RunnerError;
pub use logging::init_logging;
pub use reload::{setup_reload_signal, ReloadSignal};
pub use server_loop::{run_server, run_server_with_input};
