//! The fixed set of named dispatchers created at startup.
//!
//! The registry maps event names to their [`EventDispatcher`]s. The set is
//! populated once during initialization (see
//! [`register_builtin`](crate::events::register_builtin)); after that the
//! bridge and the plugin layer only look dispatchers up, so the map itself
//! is effectively read-only while hook chains inside it churn.

use crate::dispatcher::{EventDispatcher, HookId};
use crate::error::EventError;
use crate::events::Event;
use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;
use tracing::debug;

/// Type-erased view of a dispatcher, so the registry can hold dispatchers
/// of different payload types and sweep hooks by owner without knowing the
/// concrete event.
trait ErasedDispatcher: Send + Sync {
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
    fn remove_hook(&self, id: HookId, owner: &str) -> Result<(), EventError>;
    fn remove_owned(&self, owner: &str) -> usize;
    fn has_owner(&self, owner: &str) -> bool;
    fn hook_count(&self) -> usize;
}

impl<E: Event> ErasedDispatcher for EventDispatcher<E> {
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn remove_hook(&self, id: HookId, owner: &str) -> Result<(), EventError> {
        EventDispatcher::remove_hook(self, id, owner)
    }

    fn remove_owned(&self, owner: &str) -> usize {
        EventDispatcher::remove_owned(self, owner)
    }

    fn has_owner(&self, owner: &str) -> bool {
        EventDispatcher::has_owner(self, owner)
    }

    fn hook_count(&self) -> usize {
        EventDispatcher::hook_count(self)
    }
}

/// Name-keyed collection of every event dispatcher in the process.
pub struct DispatcherRegistry {
    dispatchers: DashMap<&'static str, Arc<dyn ErasedDispatcher>>,
}

impl DispatcherRegistry {
    pub fn new() -> Self {
        Self {
            dispatchers: DashMap::new(),
        }
    }

    /// Creates and registers the dispatcher for `E` under `E::NAME`,
    /// replacing any previous registration of that name.
    pub fn register<E: Event>(&self) -> Arc<EventDispatcher<E>> {
        let dispatcher = Arc::new(EventDispatcher::<E>::new());
        self.dispatchers
            .insert(E::NAME, dispatcher.clone() as Arc<dyn ErasedDispatcher>);
        debug!(event = E::NAME, "dispatcher registered");
        dispatcher
    }

    /// Looks up the dispatcher for `E` by its name.
    pub fn dispatcher<E: Event>(&self) -> Result<Arc<EventDispatcher<E>>, EventError> {
        let erased = self
            .dispatchers
            .get(E::NAME)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| EventError::UnknownEvent(E::NAME.to_string()))?;
        erased
            .as_any()
            .downcast::<EventDispatcher<E>>()
            .map_err(|_| EventError::TypeMismatch(E::NAME))
    }

    /// Whether a dispatcher is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.dispatchers.contains_key(name)
    }

    /// Removes one hook from the named dispatcher. Used for rollback when a
    /// plugin fails partway through registration.
    pub fn remove_hook(&self, event: &str, id: HookId, owner: &str) -> Result<(), EventError> {
        let erased = self
            .dispatchers
            .get(event)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| EventError::UnknownEvent(event.to_string()))?;
        erased.remove_hook(id, owner)
    }

    /// Removes every hook `owner` registered, across all dispatchers.
    /// Returns how many hooks were removed.
    pub fn remove_owned(&self, owner: &str) -> usize {
        self.dispatchers
            .iter()
            .map(|entry| entry.value().remove_owned(owner))
            .sum()
    }

    /// Whether any dispatcher still holds a hook owned by `owner`.
    pub fn has_owner(&self, owner: &str) -> bool {
        self.dispatchers
            .iter()
            .any(|entry| entry.value().has_owner(owner))
    }

    /// Total hooks registered across all dispatchers.
    pub fn hook_count(&self) -> usize {
        self.dispatchers
            .iter()
            .map(|entry| entry.value().hook_count())
            .sum()
    }

    /// Names of every registered event, unordered.
    pub fn event_names(&self) -> Vec<&'static str> {
        self.dispatchers.iter().map(|entry| *entry.key()).collect()
    }
}

impl Default for DispatcherRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{HookAction, Priority};
    use crate::events::{ChatEvent, FrameEvent, PlayerLoadedEvent};

    #[test]
    fn lookup_of_unregistered_event_fails() {
        let registry = DispatcherRegistry::new();
        match registry.dispatcher::<ChatEvent>() {
            Err(EventError::UnknownEvent(name)) => assert_eq!(name, "chat"),
            other => panic!("expected UnknownEvent, got {other:?}"),
        }
    }

    #[test]
    fn registered_dispatcher_is_the_one_returned() {
        let registry = DispatcherRegistry::new();
        let created = registry.register::<ChatEvent>();
        created.add_hook(Priority::Normal, "test", |_e| Ok(HookAction::Pass));

        let fetched = registry.dispatcher::<ChatEvent>().unwrap();
        assert_eq!(fetched.hook_count(), 1);
    }

    #[test]
    fn owner_sweep_spans_all_dispatchers() {
        let registry = DispatcherRegistry::new();
        registry.register::<ChatEvent>();
        registry.register::<FrameEvent>();
        registry.register::<PlayerLoadedEvent>();

        registry
            .dispatcher::<ChatEvent>()
            .unwrap()
            .add_hook(Priority::Normal, "motd", |_e| Ok(HookAction::Pass));
        registry
            .dispatcher::<PlayerLoadedEvent>()
            .unwrap()
            .add_hook(Priority::Normal, "motd", |_e| Ok(HookAction::Pass));
        registry
            .dispatcher::<FrameEvent>()
            .unwrap()
            .add_hook(Priority::Normal, "other", |_e| Ok(HookAction::Pass));

        assert!(registry.has_owner("motd"));
        assert_eq!(registry.remove_owned("motd"), 2);
        assert!(!registry.has_owner("motd"));
        assert_eq!(registry.hook_count(), 1);
    }

    #[test]
    fn targeted_hook_removal_by_event_name() {
        let registry = DispatcherRegistry::new();
        registry.register::<ChatEvent>();
        let id = registry
            .dispatcher::<ChatEvent>()
            .unwrap()
            .add_hook(Priority::Normal, "motd", |_e| Ok(HookAction::Pass));

        registry.remove_hook("chat", id, "motd").unwrap();
        assert_eq!(registry.hook_count(), 0);
        assert!(matches!(
            registry.remove_hook("nonsense", id, "motd"),
            Err(EventError::UnknownEvent(_))
        ));
    }
}
