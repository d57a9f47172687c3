//! Application configuration loaded from a TOML file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use strafe_plugin_system::{ConfigError, CoreConfig};
use tracing::info;

fn default_level() -> String {
    "info".to_string()
}

fn default_tick_interval_ms() -> u64 {
    25
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Extension layer settings: owner, prefix, plugin directory, presets.
    #[serde(default)]
    pub core: CoreConfig,

    #[serde(default)]
    pub logging: LoggingSettings,

    /// Milliseconds between emulated host frames.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub json_format: bool,

    /// Append logs to this file instead of stderr.
    #[serde(default)]
    pub file_path: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            json_format: false,
            file_path: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            logging: LoggingSettings::default(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl AppConfig {
    /// Loads configuration, writing a default file if none exists yet.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&contents)?;
            Ok(config)
        } else {
            let config = Self::default();
            let contents = toml::to_string_pretty(&config)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            std::fs::write(path, contents)?;
            info!(path = %path.display(), "created default configuration file");
            Ok(config)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.core.validate()?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "invalid log level '{}', expected one of {valid_levels:?}",
                self.logging.level
            )));
        }

        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "tick_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
