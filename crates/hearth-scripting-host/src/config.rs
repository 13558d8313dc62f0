use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptingConfig {
    /// Whether scripting is enabled (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Directory scripts are loaded from, relative to the working directory
    /// unless absolute (default: scripts)
    #[serde(default = "default_module_path")]
    pub module_path: PathBuf,

    /// Per-module configuration (module name -> config)
    #[serde(default)]
    pub modules: HashMap<String, ModuleConfig>,

    /// Give up acquiring the execution lock after this many milliseconds
    /// (default: wait forever)
    #[serde(default)]
    pub lock_timeout_ms: Option<u64>,

    /// Warn when a single handler runs longer than this many milliseconds
    #[serde(default)]
    pub slow_handler_warn_ms: Option<u64>,

    /// Drop cached events left without subscribers after a reload, so the
    /// next dispatch rescans all modules (default: false)
    #[serde(default)]
    pub evict_empty_entries: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Whether directory loads pick up this module (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_module_path() -> PathBuf {
    PathBuf::from("scripts")
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            module_path: default_module_path(),
            modules: HashMap::new(),
            lock_timeout_ms: None,
            slow_handler_warn_ms: None,
            evict_empty_entries: false,
        }
    }
}

impl ScriptingConfig {
    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }

    pub fn slow_handler_threshold(&self) -> Option<Duration> {
        self.slow_handler_warn_ms.map(Duration::from_millis)
    }

    /// Modules are enabled unless configured otherwise
    pub fn is_module_enabled(&self, name: &str) -> bool {
        self.modules
            .get(name)
            .map(|module| module.enabled)
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScriptingConfig::default();
        assert!(config.enabled);
        assert_eq!(config.module_path, PathBuf::from("scripts"));
        assert!(config.lock_timeout().is_none());
        assert!(config.slow_handler_threshold().is_none());
        assert!(!config.evict_empty_entries);
    }

    #[test]
    fn test_empty_toml_matches_default() {
        let config: ScriptingConfig = toml::from_str("").unwrap();
        assert_eq!(config, ScriptingConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let config: ScriptingConfig = toml::from_str(
            r#"
module_path = "/srv/game/scripts"
lock_timeout_ms = 250
slow_handler_warn_ms = 20
evict_empty_entries = true

[modules.debug_overlay]
enabled = false

[modules.greeter]
"#,
        )
        .unwrap();

        assert_eq!(config.module_path, PathBuf::from("/srv/game/scripts"));
        assert_eq!(config.lock_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.slow_handler_threshold(), Some(Duration::from_millis(20)));
        assert!(config.evict_empty_entries);
        assert!(!config.is_module_enabled("debug_overlay"));
        assert!(config.is_module_enabled("greeter"));
        assert!(config.is_module_enabled("unlisted"));
    }
}
