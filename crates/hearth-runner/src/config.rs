use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use hearth_scripting_host::ScriptingConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("Config file not found")]
    NotFound,
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("IO error reading config: {0}")]
    Io(#[from] io::Error),
}

/// Top-level configuration for the `hearth` server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HearthConfig {
    /// Scripting configuration
    #[serde(default)]
    pub scripting: ScriptingConfig,

    /// Milliseconds between `on_tick` events (default: 50)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Also write logs to `<data dir>/logs/hearth.log`
    #[serde(default)]
    pub log_to_file: bool,
}

fn default_tick_interval_ms() -> u64 {
    50
}

impl Default for HearthConfig {
    fn default() -> Self {
        Self {
            scripting: ScriptingConfig::default(),
            tick_interval_ms: default_tick_interval_ms(),
            log_to_file: false,
        }
    }
}

impl HearthConfig {
    /// `<config dir>/hearth/config.toml`, if a home directory can be found
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "hearth").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn load() -> Result<Self, ConfigLoadError> {
        let path = Self::config_path().ok_or(ConfigLoadError::NotFound)?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigLoadError> {
        if !path.exists() {
            return Err(ConfigLoadError::NotFound);
        }

        let content = fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}
