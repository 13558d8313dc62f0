use std::io::{self, Write};
use std::time::Duration;

use hearth_scripting_host::{ScriptHost, ScriptRuntime};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::console::{execute, ConsoleCommand};
use crate::error::RunnerError;
use crate::reload::{setup_reload_signal, ReloadSignal};

/// Drive the host from stdin until `quit` or Ctrl+C
pub async fn run_server<R: ScriptRuntime>(
    host: &mut ScriptHost<R>,
    tick_interval: Duration,
) -> Result<(), RunnerError> {
    let stdin = BufReader::new(tokio::io::stdin());
    run_server_with_input(host, tick_interval, stdin, &mut io::stdout()).await
}

/// Run the server loop.
///
/// Dispatches `on_start()` once, then `on_tick(tick, elapsed_ms)` every
/// `tick_interval` while serving console commands read from `input` and
/// reloading every module on SIGUSR2. `on_shutdown()` is dispatched on the
/// way out. The loop ends on a `quit` command or Ctrl+C; reaching the end of
/// `input` only stops the console.
pub async fn run_server_with_input<R, I, W>(
    host: &mut ScriptHost<R>,
    tick_interval: Duration,
    input: I,
    out: &mut W,
) -> Result<(), RunnerError>
where
    R: ScriptRuntime,
    I: AsyncBufRead + Unpin,
    W: Write,
{
    let mut reload_rx = setup_reload_signal();
    let mut lines = input.lines();
    let mut console_open = true;

    host.dispatch_event("on_start", ())?;

    let started = Instant::now();
    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tick: u64 = 0;

    info!(
        "Server loop running ({} module(s), tick every {:?})",
        host.registry().len(),
        tick_interval
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tick += 1;
                let elapsed_ms = started.elapsed().as_millis() as u64;
                host.dispatch_event("on_tick", (tick, elapsed_ms))?;
            }
            Some(ReloadSignal) = reload_rx.recv() => {
                let reloaded = host.reload_all()?;
                info!(target: "scripting", "Reloaded {} of {} module(s)", reloaded, host.registry().len());
            }
            line = lines.next_line(), if console_open => {
                match line {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => match line.parse::<ConsoleCommand>() {
                        Ok(command) => {
                            if execute(host, command, out)?.is_break() {
                                info!("Quit requested from console");
                                break;
                            }
                        }
                        Err(e) => writeln!(out, "{}", e)?,
                    },
                    Ok(None) => {
                        info!("Console input closed");
                        console_open = false;
                    }
                    Err(e) => {
                        warn!("Failed to read console input: {}", e);
                        console_open = false;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    host.dispatch_event("on_shutdown", ())?;
    info!("Server loop stopped after {} tick(s)", tick);
    Ok(())
}
