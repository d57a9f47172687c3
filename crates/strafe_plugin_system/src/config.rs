//! Core configuration: owner, command prefix, plugin directory, and the
//! preset plugin list loaded at startup.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

fn default_prefix() -> String {
    "!".to_string()
}

fn default_plugin_dir() -> String {
    "plugins".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Identity of the server owner, shown by plugins that care.
    #[serde(default)]
    pub owner: String,

    /// Prefix that marks chat input as a command.
    #[serde(default = "default_prefix")]
    pub command_prefix: String,

    /// Directory scanned for plugin units.
    #[serde(default = "default_plugin_dir")]
    pub plugin_dir: String,

    /// Plugins loaded at startup, in order.
    #[serde(default)]
    pub plugins: Vec<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            command_prefix: default_prefix(),
            plugin_dir: default_plugin_dir(),
            plugins: Vec::new(),
        }
    }
}

impl CoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "command_prefix must not be empty".to_string(),
            ));
        }
        if self.command_prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid(
                "command_prefix must not contain whitespace".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for name in &self.plugins {
            if name.is_empty() {
                return Err(ConfigError::Invalid(
                    "plugin names must not be empty".to_string(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "plugin '{name}' is listed more than once"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: CoreConfig = toml::from_str("owner = \"steam:123\"").unwrap();
        assert_eq!(config.owner, "steam:123");
        assert_eq!(config.command_prefix, "!");
        assert_eq!(config.plugin_dir, "plugins");
        assert!(config.plugins.is_empty());
    }

    #[test]
    fn full_config_parses_and_validates() {
        let config: CoreConfig = toml::from_str(
            "owner = \"steam:123\"\n\
             command_prefix = \"?\"\n\
             plugin_dir = \"extensions\"\n\
             plugins = [\"motd\", \"balance\"]\n",
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.command_prefix, "?");
        assert_eq!(config.plugin_dir, "extensions");
        assert_eq!(config.plugins, vec!["motd", "balance"]);
    }

    #[test]
    fn validation_rejects_bad_prefixes_and_duplicate_plugins() {
        let mut config = CoreConfig::default();
        config.command_prefix = String::new();
        assert!(config.validate().is_err());

        config.command_prefix = "! ".to_string();
        assert!(config.validate().is_err());

        config.command_prefix = "!".to_string();
        config.plugins = vec!["motd".to_string(), "motd".to_string()];
        assert!(config.validate().is_err());
    }
}
