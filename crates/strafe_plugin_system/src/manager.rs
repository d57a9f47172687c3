//! Plugin lifecycle: load, unload, reload, and startup preset loading.

use crate::commands::CommandRegistry;
use crate::config::CoreConfig;
use crate::error::PluginError;
use crate::loader::{PluginHandle, PluginLoader};
use crate::plugin::Registrar;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use strafe_event_system::{panic_message, DispatcherRegistry, PluginUnloadEvent, TaskQueue};
use tracing::{debug, error, info, warn};

struct LoadedPlugin {
    handle: PluginHandle,
    version: String,
    hook_count: usize,
    command_count: usize,
}

/// Owns every loaded plugin and drives its lifecycle.
///
/// The manager is the only writer of plugin state; all mutation happens on
/// the host thread. Registrations are keyed by the plugin's name, which is
/// what makes the unload sweep exhaustive.
pub struct PluginManager {
    events: Arc<DispatcherRegistry>,
    commands: Arc<CommandRegistry>,
    tasks: Arc<TaskQueue>,
    loader: Box<dyn PluginLoader>,
    plugins: RwLock<HashMap<String, LoadedPlugin>>,
}

impl PluginManager {
    pub fn new(
        events: Arc<DispatcherRegistry>,
        commands: Arc<CommandRegistry>,
        tasks: Arc<TaskQueue>,
        loader: Box<dyn PluginLoader>,
    ) -> Self {
        Self {
            events,
            commands,
            tasks,
            loader,
            plugins: RwLock::new(HashMap::new()),
        }
    }

    /// Loads a plugin by name. Loading an already-loaded plugin reloads it.
    pub fn load(&self, name: &str) -> Result<(), PluginError> {
        if self.is_loaded(name) {
            info!(plugin = name, "already loaded, reloading instead");
            return self.reload(name);
        }
        if !self.loader.exists(name) {
            return Err(PluginError::NotFound(name.to_string()));
        }
        self.load_fresh(name)
    }

    fn load_fresh(&self, name: &str) -> Result<(), PluginError> {
        let mut handle = self.loader.load(name)?;

        let mut registrar = Registrar::new(name, &self.events, &self.commands, &self.tasks);
        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| handle.plugin.register(&mut registrar)));
        let (hooks, command_names) = registrar.into_parts();

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(payload) => Some(panic_message(payload.as_ref())),
        };
        if let Some(reason) = failure {
            self.rollback(name, &hooks, &command_names);
            return Err(PluginError::RegistrationFailed {
                name: name.to_string(),
                reason,
            });
        }

        let version = handle.plugin.version().to_string();
        info!(
            plugin = name,
            version,
            hooks = hooks.len(),
            commands = command_names.len(),
            "plugin loaded"
        );
        self.plugins.write().insert(
            name.to_string(),
            LoadedPlugin {
                handle,
                version,
                hook_count: hooks.len(),
                command_count: command_names.len(),
            },
        );
        Ok(())
    }

    /// Best-effort removal of everything a failed load registered. A miss
    /// is logged, not fatal; the later owner sweep on unload would catch
    /// nothing because the plugin never becomes loaded.
    fn rollback(&self, name: &str, hooks: &[(&'static str, strafe_event_system::HookId)], commands: &[String]) {
        for (event, id) in hooks {
            if let Err(e) = self.events.remove_hook(event, *id, name) {
                warn!(plugin = name, event, "rollback could not remove hook: {e}");
            }
        }
        for command in commands {
            if let Err(e) = self.commands.remove(command, name) {
                warn!(plugin = name, command, "rollback could not remove command: {e}");
            }
        }
    }

    /// Unloads a plugin: notifies hooks, calls the plugin's own unload,
    /// then sweeps every registration keyed by its name.
    pub fn unload(&self, name: &str) -> Result<(), PluginError> {
        let mut loaded = self
            .plugins
            .write()
            .remove(name)
            .ok_or_else(|| PluginError::NotLoaded(name.to_string()))?;

        // Registrations are still live here, so the plugin's own hooks see
        // the notification too.
        if let Ok(dispatcher) = self.events.dispatcher::<PluginUnloadEvent>() {
            dispatcher.dispatch(&PluginUnloadEvent {
                plugin: name.to_string(),
            });
        }

        if let Err(payload) =
            panic::catch_unwind(AssertUnwindSafe(|| loaded.handle.plugin.on_unload()))
        {
            error!(
                plugin = name,
                "on_unload panicked: {}",
                panic_message(payload.as_ref())
            );
        }

        let hooks = self.events.remove_owned(name);
        let commands = self.commands.remove_owned(name);
        info!(plugin = name, hooks, commands, "plugin unloaded");
        // `loaded` drops here: instance first, then its library.
        Ok(())
    }

    /// Unloads (if loaded) and loads again from the loader, picking up a
    /// replaced unit on disk.
    pub fn reload(&self, name: &str) -> Result<(), PluginError> {
        match self.unload(name) {
            Ok(()) | Err(PluginError::NotLoaded(_)) => {}
            Err(e) => return Err(e),
        }
        if !self.loader.exists(name) {
            return Err(PluginError::NotFound(name.to_string()));
        }
        self.load_fresh(name)
    }

    /// Loads the configured preset plugins in order, skipping any that are
    /// already loaded. A failure stops the run and propagates.
    pub fn load_preset(&self, config: &CoreConfig) -> Result<usize, PluginError> {
        let mut count = 0;
        for name in &config.plugins {
            if self.is_loaded(name) {
                debug!(plugin = %name, "preset plugin already loaded");
                continue;
            }
            self.load(name)?;
            count += 1;
        }
        Ok(count)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.plugins.read().contains_key(name)
    }

    /// Loaded plugin names with versions, sorted by name.
    pub fn loaded_plugins(&self) -> Vec<(String, String)> {
        let mut listing: Vec<(String, String)> = self
            .plugins
            .read()
            .iter()
            .map(|(name, p)| (name.clone(), p.version.clone()))
            .collect();
        listing.sort();
        listing
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.read().len()
    }

    /// Registration counts for one loaded plugin.
    pub fn plugin_stats(&self, name: &str) -> Option<(usize, usize)> {
        self.plugins
            .read()
            .get(name)
            .map(|p| (p.hook_count, p.command_count))
    }

    pub fn events(&self) -> &Arc<DispatcherRegistry> {
        &self.events
    }

    pub fn commands(&self) -> &Arc<CommandRegistry> {
        &self.commands
    }

    pub fn tasks(&self) -> &Arc<TaskQueue> {
        &self.tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandSource;
    use crate::plugin::Plugin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use strafe_event_system::{
        register_builtin, EventError, HookAction, PlayerLoadedEvent, Priority,
    };

    type Factory = Box<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

    #[derive(Default)]
    struct TestLoader {
        factories: HashMap<String, Factory>,
    }

    impl TestLoader {
        fn with<F>(mut self, name: &str, factory: F) -> Self
        where
            F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
        {
            self.factories.insert(name.to_string(), Box::new(factory));
            self
        }
    }

    impl PluginLoader for TestLoader {
        fn load(&self, name: &str) -> Result<PluginHandle, PluginError> {
            let factory =
                self.factories
                    .get(name)
                    .ok_or_else(|| PluginError::LoadFailed {
                        name: name.to_string(),
                        reason: "unit missing".to_string(),
                    })?;
            Ok(PluginHandle {
                plugin: factory(),
                _library: None,
            })
        }

        fn exists(&self, name: &str) -> bool {
            self.factories.contains_key(name)
        }
    }

    fn manager_with(loader: TestLoader) -> PluginManager {
        let events = Arc::new(DispatcherRegistry::new());
        register_builtin(&events);
        PluginManager::new(
            events,
            Arc::new(CommandRegistry::new("!")),
            Arc::new(TaskQueue::new()),
            Box::new(loader),
        )
    }

    struct GreeterPlugin {
        greets: Arc<AtomicUsize>,
        unloads: Arc<AtomicUsize>,
    }

    impl Plugin for GreeterPlugin {
        fn name(&self) -> &str {
            "greeter"
        }

        fn register(&mut self, registrar: &mut Registrar) -> Result<(), PluginError> {
            let greets = self.greets.clone();
            registrar.hook(Priority::Normal, move |_e: &PlayerLoadedEvent| {
                greets.fetch_add(1, Ordering::SeqCst);
                Ok(HookAction::Pass)
            })?;
            registrar.command("greet", |_inv| {})?;
            Ok(())
        }

        fn on_unload(&mut self) {
            self.unloads.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn greeter_loader(greets: &Arc<AtomicUsize>, unloads: &Arc<AtomicUsize>) -> TestLoader {
        let greets = greets.clone();
        let unloads = unloads.clone();
        TestLoader::default().with("greeter", move || {
            Box::new(GreeterPlugin {
                greets: greets.clone(),
                unloads: unloads.clone(),
            })
        })
    }

    fn dispatch_player_loaded(manager: &PluginManager) {
        manager
            .events()
            .dispatcher::<PlayerLoadedEvent>()
            .unwrap()
            .dispatch(&PlayerLoadedEvent { client: 1 });
    }

    #[test]
    fn load_registers_hooks_and_commands() {
        let greets = Arc::new(AtomicUsize::new(0));
        let unloads = Arc::new(AtomicUsize::new(0));
        let manager = manager_with(greeter_loader(&greets, &unloads));

        manager.load("greeter").unwrap();
        assert!(manager.is_loaded("greeter"));
        assert_eq!(manager.plugin_stats("greeter"), Some((1, 1)));

        dispatch_player_loaded(&manager);
        assert_eq!(greets.load(Ordering::SeqCst), 1);
        assert!(manager
            .commands()
            .handle_input(CommandSource::Console, "greet"));
    }

    #[test]
    fn unload_sweeps_every_registration() {
        let greets = Arc::new(AtomicUsize::new(0));
        let unloads = Arc::new(AtomicUsize::new(0));
        let manager = manager_with(greeter_loader(&greets, &unloads));

        manager.load("greeter").unwrap();
        manager.unload("greeter").unwrap();

        assert!(!manager.is_loaded("greeter"));
        assert_eq!(unloads.load(Ordering::SeqCst), 1);
        assert_eq!(manager.events().hook_count(), 0);
        assert_eq!(manager.commands().command_count(), 0);

        dispatch_player_loaded(&manager);
        assert_eq!(greets.load(Ordering::SeqCst), 0);
        assert!(!manager
            .commands()
            .handle_input(CommandSource::Console, "greet"));
    }

    #[test]
    fn reload_of_never_loaded_plugin_is_a_plain_load() {
        let greets = Arc::new(AtomicUsize::new(0));
        let unloads = Arc::new(AtomicUsize::new(0));
        let manager = manager_with(greeter_loader(&greets, &unloads));

        manager.reload("greeter").unwrap();
        assert!(manager.is_loaded("greeter"));
        assert_eq!(unloads.load(Ordering::SeqCst), 0);

        dispatch_player_loaded(&manager);
        assert_eq!(greets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unload_of_unloaded_plugin_is_an_error() {
        let manager = manager_with(TestLoader::default());
        assert!(matches!(
            manager.unload("ghost"),
            Err(PluginError::NotLoaded(_))
        ));
    }

    #[test]
    fn load_of_unknown_plugin_is_not_found() {
        let manager = manager_with(TestLoader::default());
        assert!(matches!(
            manager.load("ghost"),
            Err(PluginError::NotFound(_))
        ));
    }

    #[test]
    fn loading_a_loaded_plugin_reloads_without_duplicates() {
        let greets = Arc::new(AtomicUsize::new(0));
        let unloads = Arc::new(AtomicUsize::new(0));
        let manager = manager_with(greeter_loader(&greets, &unloads));

        manager.load("greeter").unwrap();
        manager.load("greeter").unwrap();

        assert_eq!(unloads.load(Ordering::SeqCst), 1);
        assert_eq!(manager.events().hook_count(), 1);
        assert_eq!(manager.commands().command_count(), 1);

        dispatch_player_loaded(&manager);
        assert_eq!(greets.load(Ordering::SeqCst), 1);
    }

    struct BrokenPlugin {
        panic_instead: bool,
    }

    impl Plugin for BrokenPlugin {
        fn name(&self) -> &str {
            "broken"
        }

        fn register(&mut self, registrar: &mut Registrar) -> Result<(), PluginError> {
            registrar.hook(Priority::Normal, |_e: &PlayerLoadedEvent| {
                Ok(HookAction::Pass)
            })?;
            registrar.command("halfway", |_inv| {})?;
            if self.panic_instead {
                panic!("register blew up");
            }
            Err(PluginError::Event(EventError::HookFailed(
                "backend offline".to_string(),
            )))
        }
    }

    #[test]
    fn failed_registration_rolls_back_partial_state() {
        for panic_instead in [false, true] {
            let manager = manager_with(
                TestLoader::default()
                    .with("broken", move || Box::new(BrokenPlugin { panic_instead })),
            );

            assert!(matches!(
                manager.load("broken"),
                Err(PluginError::RegistrationFailed { .. })
            ));
            assert!(!manager.is_loaded("broken"));
            assert_eq!(manager.events().hook_count(), 0);
            assert_eq!(manager.commands().command_count(), 0);
        }
    }

    #[test]
    fn unload_notification_reaches_remaining_hooks() {
        let greets = Arc::new(AtomicUsize::new(0));
        let unloads = Arc::new(AtomicUsize::new(0));
        let manager = manager_with(greeter_loader(&greets, &unloads));

        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        manager
            .events()
            .dispatcher::<PluginUnloadEvent>()
            .unwrap()
            .add_hook(Priority::Normal, "watcher", move |e: &PluginUnloadEvent| {
                sink.lock().push(e.plugin.clone());
                Ok(HookAction::Pass)
            });

        manager.load("greeter").unwrap();
        manager.unload("greeter").unwrap();
        assert_eq!(*seen.lock(), vec!["greeter"]);
    }

    #[test]
    fn preset_loading_skips_already_loaded_plugins() {
        let greets = Arc::new(AtomicUsize::new(0));
        let unloads = Arc::new(AtomicUsize::new(0));
        let manager = manager_with(greeter_loader(&greets, &unloads));

        let config = CoreConfig {
            plugins: vec!["greeter".to_string()],
            ..CoreConfig::default()
        };
        assert_eq!(manager.load_preset(&config).unwrap(), 1);
        assert_eq!(manager.load_preset(&config).unwrap(), 0);
        assert_eq!(manager.plugin_count(), 1);
    }

    #[test]
    fn preset_loading_propagates_failures() {
        let manager = manager_with(TestLoader::default());
        let config = CoreConfig {
            plugins: vec!["ghost".to_string()],
            ..CoreConfig::default()
        };
        assert!(matches!(
            manager.load_preset(&config),
            Err(PluginError::NotFound(_))
        ));
    }
}
