//! Message-of-the-day plugin.
//!
//! Greets players when they finish loading and exposes a `motd` command:
//! bare it shows the current message, with arguments it sets a new one.

use parking_lot::RwLock;
use std::sync::Arc;
use strafe_event_system::{HookAction, PlayerLoadedEvent, Priority};
use strafe_plugin_system::{Plugin, PluginError, Registrar};
use tracing::info;

const DEFAULT_MOTD: &str = "Welcome to the server!";

pub struct MotdPlugin {
    motd: Arc<RwLock<String>>,
}

impl MotdPlugin {
    pub fn new() -> Self {
        Self {
            motd: Arc::new(RwLock::new(DEFAULT_MOTD.to_string())),
        }
    }

    pub fn motd(&self) -> String {
        self.motd.read().clone()
    }
}

impl Default for MotdPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for MotdPlugin {
    fn name(&self) -> &str {
        "motd"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn register(&mut self, registrar: &mut Registrar) -> Result<(), PluginError> {
        let motd = self.motd.clone();
        registrar.hook(Priority::Low, move |e: &PlayerLoadedEvent| {
            info!(client = e.client, "motd: {}", motd.read());
            Ok(HookAction::Pass)
        })?;

        let motd = self.motd.clone();
        registrar.command("motd", move |inv| {
            if inv.args.is_empty() {
                info!("motd: {}", motd.read());
            } else {
                let new_motd = inv.args.join(" ");
                info!("motd set to: {new_motd}");
                *motd.write() = new_motd;
            }
        })?;

        Ok(())
    }

    fn on_unload(&mut self) {
        info!("motd plugin unloading");
    }
}

// The loader resolves this symbol by the name in PLUGIN_ENTRY.
#[no_mangle]
pub extern "C" fn strafe_plugin_create() -> *mut dyn Plugin {
    Box::into_raw(Box::new(MotdPlugin::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strafe_event_system::{register_builtin, DispatcherRegistry, TaskQueue};
    use strafe_plugin_system::{
        CommandRegistry, CommandSource, PluginHandle, PluginLoader, PluginManager, PLUGIN_ENTRY,
    };

    struct LocalLoader;

    impl PluginLoader for LocalLoader {
        fn load(&self, _name: &str) -> Result<PluginHandle, PluginError> {
            Ok(PluginHandle {
                plugin: Box::new(MotdPlugin::new()),
                _library: None,
            })
        }

        fn exists(&self, name: &str) -> bool {
            name == "motd"
        }
    }

    fn manager() -> PluginManager {
        let events = Arc::new(DispatcherRegistry::new());
        register_builtin(&events);
        PluginManager::new(
            events,
            Arc::new(CommandRegistry::new("!")),
            Arc::new(TaskQueue::new()),
            Box::new(LocalLoader),
        )
    }

    #[test]
    fn plugin_registers_one_hook_and_one_command() {
        let manager = manager();
        manager.load("motd").unwrap();
        assert_eq!(manager.plugin_stats("motd"), Some((1, 1)));
    }

    #[test]
    fn motd_command_sets_and_shows_the_message() {
        let manager = manager();
        manager.load("motd").unwrap();

        assert!(manager
            .commands()
            .handle_input(CommandSource::Console, "!motd Good luck, have fun"));
        assert!(manager
            .commands()
            .handle_input(CommandSource::Console, "motd"));
    }

    #[test]
    fn entry_point_constructs_a_named_plugin() {
        let raw = strafe_plugin_create();
        let plugin = unsafe { Box::from_raw(raw) };
        assert_eq!(plugin.name(), "motd");
    }

    #[test]
    fn exported_symbol_matches_the_loader_key() {
        assert_eq!(PLUGIN_ENTRY, b"strafe_plugin_create");
    }
}
