use std::io::Write;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::str::FromStr;

use hearth_scripting_host::{ScriptHost, ScriptRuntime};
use serde::Deserialize;
use thiserror::Error;

use crate::error::RunnerError;

const HELP: &str = "\
Commands:
  dispatch <event> [args...]  Send an event to every script handling it
  reload <module>             Reload one module in place
  load <path>                 Load a script file
  evict <module>              Unload a module
  list                        List loaded modules
  events                      List resolved events and their handlers
  help                        Show this message
  quit                        Shut the server down";

/// A line typed into the server console
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Dispatch {
        event: String,
        args: Vec<toml::Value>,
    },
    Reload(String),
    Load(PathBuf),
    Evict(String),
    List,
    Events,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseCommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),
    #[error("`{command}` needs a {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
}

impl FromStr for ConsoleCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words.next().ok_or(ParseCommandError::Empty)?;

        match command {
            "dispatch" => {
                let event = required(&mut words, "dispatch", "event name")?;
                Ok(ConsoleCommand::Dispatch {
                    event,
                    args: words.map(parse_arg).collect(),
                })
            }
            "reload" => Ok(ConsoleCommand::Reload(required(&mut words, "reload", "module name")?)),
            "load" => Ok(ConsoleCommand::Load(PathBuf::from(required(&mut words, "load", "path")?))),
            "evict" => Ok(ConsoleCommand::Evict(required(&mut words, "evict", "module name")?)),
            "list" => Ok(ConsoleCommand::List),
            "events" => Ok(ConsoleCommand::Events),
            "help" => Ok(ConsoleCommand::Help),
            "quit" | "exit" => Ok(ConsoleCommand::Quit),
            other => Err(ParseCommandError::Unknown(other.to_string())),
        }
    }
}

fn required<'a>(
    words: &mut impl Iterator<Item = &'a str>,
    command: &'static str,
    argument: &'static str,
) -> Result<String, ParseCommandError> {
    words
        .next()
        .map(str::to_string)
        .ok_or(ParseCommandError::MissingArgument { command, argument })
}

/// Read a word as a TOML scalar (`3`, `2.5`, `true`, `"quoted"`), or keep it as text
fn parse_arg(word: &str) -> toml::Value {
    #[derive(Deserialize)]
    struct Scalar {
        v: toml::Value,
    }

    match toml::from_str::<Scalar>(&format!("v = {}", word)) {
        Ok(Scalar {
            v:
                value @ (toml::Value::Integer(_)
                | toml::Value::Float(_)
                | toml::Value::Boolean(_)
                | toml::Value::String(_)),
        }) => value,
        _ => toml::Value::String(word.to_string()),
    }
}

/// Run a console command against the host, writing its output to `out`
pub fn execute<R: ScriptRuntime, W: Write>(
    host: &mut ScriptHost<R>,
    command: ConsoleCommand,
    out: &mut W,
) -> Result<ControlFlow<()>, RunnerError> {
    match command {
        ConsoleCommand::Dispatch { event, args } => {
            let report = host.dispatch_event(&event, args)?;
            writeln!(
                out,
                "{}: {} handler(s) invoked, {} failed",
                event, report.invoked, report.failed
            )?;
        }
        ConsoleCommand::Reload(name) => {
            if host.reload_script(&name)? {
                writeln!(out, "Reloaded {}", name)?;
            } else {
                writeln!(out, "Failed to reload {} (see log)", name)?;
            }
        }
        ConsoleCommand::Load(path) => {
            if host.load_script(&path)? {
                writeln!(out, "Loaded {}", path.display())?;
            } else {
                writeln!(out, "Failed to load {} (see log)", path.display())?;
            }
        }
        ConsoleCommand::Evict(name) => {
            if host.evict_script(&name)? {
                writeln!(out, "Evicted {}", name)?;
            } else {
                writeln!(out, "{} is not loaded", name)?;
            }
        }
        ConsoleCommand::List => {
            let registry = host.registry();
            writeln!(out, "{} module(s) loaded", registry.len())?;
            for record in registry.names().into_iter().filter_map(|n| registry.find(n)) {
                writeln!(
                    out,
                    "  {} ({}, generation {})",
                    record.name(),
                    record.relative_path().display(),
                    record.generation()
                )?;
            }
        }
        ConsoleCommand::Events => {
            let cache = host.cache();
            writeln!(out, "{} event(s) resolved", cache.len())?;
            for event in cache.events() {
                let modules = cache.lookup(event).unwrap_or_default().join(", ");
                writeln!(out, "  {}: [{}]", event, modules)?;
            }
        }
        ConsoleCommand::Help => writeln!(out, "{}", HELP)?,
        ConsoleCommand::Quit => return Ok(ControlFlow::Break(())),
    }

    Ok(ControlFlow::Continue(()))
}
