//! The [`Plugin`] trait and the [`Registrar`] handed to it at load time.

use crate::commands::{CommandInvocation, CommandRegistry};
use crate::error::PluginError;
use std::sync::Arc;
use strafe_event_system::{
    DispatcherRegistry, Event, HookId, HookResult, Priority, TaskQueue,
};

/// A loadable extension.
///
/// Implementations are constructed by their unit's exported
/// [`PLUGIN_ENTRY`](crate::loader::PLUGIN_ENTRY) function, asked to register
/// their hooks and commands once, and dropped on unload.
pub trait Plugin: Send + Sync {
    /// The plugin's name. Must match the unit it was loaded from; it is the
    /// owner key for every registration the plugin makes.
    fn name(&self) -> &str;

    fn version(&self) -> &str {
        "0.1.0"
    }

    /// Called once after construction. Every hook and command the plugin
    /// wants lives here; an error or panic aborts the load and rolls back
    /// anything already registered.
    fn register(&mut self, registrar: &mut Registrar) -> Result<(), PluginError>;

    /// Called right before the plugin is dropped. Registrations are cleaned
    /// up by the manager; this is for the plugin's own resources.
    fn on_unload(&mut self) {}
}

/// Registration facade scoped to one plugin.
///
/// Records everything the plugin registers so the manager can roll back a
/// failed load without relying on the owner sweep.
pub struct Registrar<'a> {
    owner: String,
    events: &'a DispatcherRegistry,
    commands: &'a CommandRegistry,
    tasks: &'a Arc<TaskQueue>,
    hooks: Vec<(&'static str, HookId)>,
    command_names: Vec<String>,
}

impl<'a> Registrar<'a> {
    pub(crate) fn new(
        owner: &str,
        events: &'a DispatcherRegistry,
        commands: &'a CommandRegistry,
        tasks: &'a Arc<TaskQueue>,
    ) -> Self {
        Self {
            owner: owner.to_string(),
            events,
            commands,
            tasks,
            hooks: Vec::new(),
            command_names: Vec::new(),
        }
    }

    /// Hooks an event by payload type.
    pub fn hook<E, F>(&mut self, priority: Priority, handler: F) -> Result<(), PluginError>
    where
        E: Event,
        F: Fn(&E) -> HookResult<E> + Send + Sync + 'static,
    {
        let dispatcher = self.events.dispatcher::<E>()?;
        let id = dispatcher.add_hook(priority, &self.owner, handler);
        self.hooks.push((E::NAME, id));
        Ok(())
    }

    /// Registers a console/chat command.
    pub fn command<F>(&mut self, name: &str, handler: F) -> Result<(), PluginError>
    where
        F: Fn(&CommandInvocation) + Send + Sync + 'static,
    {
        self.commands.register(name, &self.owner, handler)?;
        self.command_names.push(name.to_ascii_lowercase());
        Ok(())
    }

    /// The shared task queue, for handing work back to the host thread from
    /// plugin worker threads.
    pub fn tasks(&self) -> Arc<TaskQueue> {
        Arc::clone(self.tasks)
    }

    pub(crate) fn into_parts(self) -> (Vec<(&'static str, HookId)>, Vec<String>) {
        (self.hooks, self.command_names)
    }
}
