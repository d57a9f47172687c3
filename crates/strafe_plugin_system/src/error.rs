//! Error types for plugin lifecycle and configuration.

use strafe_event_system::EventError;
use thiserror::Error;

/// Errors surfaced by the plugin manager, loader, and command registry.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The plugin's unit does not exist in the plugin directory.
    #[error("plugin '{0}' was not found in the plugin directory")]
    NotFound(String),

    /// Unload or reload was requested for a plugin that is not loaded.
    #[error("plugin '{0}' is not loaded")]
    NotLoaded(String),

    /// The plugin unit could not be opened.
    #[error("failed to load plugin '{name}': {reason}")]
    LoadFailed { name: String, reason: String },

    /// The unit loaded but exposes no usable constructor, or the
    /// constructor returned null.
    #[error("plugin unit '{0}' has no usable entry point")]
    BadEntryPoint(String),

    /// The constructed plugin reports a different name than the unit it
    /// was loaded from. Owner-keyed cleanup depends on the two agreeing.
    #[error("plugin unit '{unit}' declares itself as '{declared}'")]
    NameMismatch { unit: String, declared: String },

    /// The plugin's `register` hook failed or panicked. Any registrations
    /// it made before failing have been rolled back.
    #[error("plugin '{name}' failed during registration: {reason}")]
    RegistrationFailed { name: String, reason: String },

    /// A command name is already taken.
    #[error("command '{name}' is already registered by '{owner}'")]
    DuplicateCommand { name: String, owner: String },

    /// Command removal was requested for a name/owner pair that is not
    /// registered.
    #[error("no command '{0}' registered by that owner")]
    UnknownCommand(String),

    #[error(transparent)]
    Event(#[from] EventError),
}

/// Errors from reading or validating the core configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
