use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use hearth_runner::logging::{init_logging, level_for_verbosity};
use hearth_runner::{run_server, ConfigLoadError, HearthConfig};
use hearth_scripting_host::{LuaRuntime, LuaScriptHost};
use tracing::{info, warn};

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enables debug mode (repeat for trace output)
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to load scripts from (overrides config file)
    #[arg(long)]
    script_dir: Option<PathBuf>,

    /// Milliseconds between ticks (overrides config file)
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Also write logs to the data directory
    #[arg(long)]
    log_file: bool,
}

fn load_config(cli: &Cli) -> Result<HearthConfig, Box<dyn Error>> {
    let result = match &cli.config {
        Some(path) => HearthConfig::load_from(path),
        None => HearthConfig::load(),
    };

    match result {
        Ok(config) => Ok(config),
        // The default location is optional
        Err(ConfigLoadError::NotFound) if cli.config.is_none() => Ok(HearthConfig::default()),
        Err(err) => Err(format!("Failed to load config: {}", err).into()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let _log_guard = init_logging(
        "hearth",
        cli.log_file || config.log_to_file,
        level_for_verbosity(cli.debug),
    )?;

    info!("Starting hearth...");

    let mut scripting = config.scripting.clone();
    if let Some(dir) = cli.script_dir.clone() {
        scripting.module_path = dir;
    }
    let tick_interval = cli
        .tick_ms
        .map(|ms| Duration::from_millis(ms.max(1)))
        .unwrap_or_else(|| config.tick_interval());

    let mut host = LuaScriptHost::with_config(LuaRuntime::new(), scripting);

    if host.config().enabled {
        host.load_scripts(None)?;
    } else {
        warn!("Scripting is disabled in config, no scripts will be loaded");
    }

    run_server(&mut host, tick_interval).await?;

    info!("hearth stopped");
    Ok(())
}
