//! # Strafe Plugin System
//!
//! Plugin lifecycle for the Strafe extension layer: dynamic loading from
//! cdylib units, registration of event hooks and commands through a
//! per-plugin [`Registrar`], and clean unload driven by owner-keyed sweeps.
//!
//! A plugin is a `Box<dyn Plugin>` constructed by the unit's exported
//! [`PLUGIN_ENTRY`](loader::PLUGIN_ENTRY) function. Loading an
//! already-loaded plugin reloads it; unloading removes every hook and
//! command the plugin registered before its library is closed. A plugin
//! that fails or panics during registration is rolled back and never
//! becomes loaded.

pub mod commands;
pub mod config;
pub mod error;
pub mod loader;
pub mod manager;
pub mod plugin;

pub use commands::{CommandInvocation, CommandRegistry, CommandSource};
pub use config::CoreConfig;
pub use error::{ConfigError, PluginError};
pub use loader::{DylibLoader, PluginHandle, PluginLoader, PLUGIN_ENTRY};
pub use manager::PluginManager;
pub use plugin::{Plugin, Registrar};
