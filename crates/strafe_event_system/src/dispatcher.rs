//! Per-event hook chains and dispatch.
//!
//! An [`EventDispatcher`] owns the ordered hook chain for one event kind.
//! Hooks run highest priority first, ties broken by registration order, and
//! the order is stable for a fixed registration set: two dispatch passes
//! over the same hooks always agree.
//!
//! Dispatch aggregates a [`DispatchOutcome`]: pass through unchanged, carry
//! the last replacement payload a hook produced, or veto. A veto
//! short-circuits the chain: later hooks never observe a vetoed
//! invocation. A hook that panics or returns an error is logged with its
//! owner and treated as "no opinion"; it cannot abort the chain and its
//! fault never reaches the caller.

use crate::error::{panic_message, EventError};
use crate::events::Event;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// Hook priority. Higher priorities run earlier; ties are broken by
/// registration order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Priority {
    Highest,
    High,
    Normal,
    Low,
    Lowest,
}

/// Identifies one registered hook within its dispatcher.
///
/// Returned by [`EventDispatcher::add_hook`]; also the registration-order
/// tie-breaker, since the counter behind it is monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(pub(crate) u64);

/// What one hook decided about one invocation.
#[derive(Debug, Clone)]
pub enum HookAction<E: Event> {
    /// No opinion; the chain continues with the current payload.
    Pass,
    /// Veto the underlying host action. No further hooks run.
    Veto,
    /// Substitute a replacement payload for later hooks and for the final
    /// outcome, then continue the chain.
    Replace(E::Override),
}

/// Return type of a hook handler. `Err` is contained by the dispatcher and
/// treated as [`HookAction::Pass`].
pub type HookResult<E> = Result<HookAction<E>, EventError>;

/// Aggregate result of running one event's hook chain.
#[derive(Debug, Clone)]
pub enum DispatchOutcome<E: Event> {
    /// Every hook passed; the original payload stands.
    Unchanged,
    /// At least one hook produced a replacement; this is the last one.
    Replaced(E::Override),
    /// A hook vetoed the event; hooks after it were not invoked.
    Vetoed,
}

impl<E: Event> DispatchOutcome<E> {
    /// Whether the chain vetoed the event.
    pub fn is_vetoed(&self) -> bool {
        matches!(self, DispatchOutcome::Vetoed)
    }
}

struct HookEntry<E: Event> {
    id: HookId,
    priority: Priority,
    owner: String,
    handler: Box<dyn Fn(&E) -> HookResult<E> + Send + Sync>,
}

/// The ordered hook chain for one event kind.
///
/// Mutation (add/remove) is expected on the main thread only; dispatch
/// snapshots the chain before running it, so hooks may register or remove
/// hooks on the same dispatcher reentrantly without deadlocking.
pub struct EventDispatcher<E: Event> {
    hooks: RwLock<Vec<Arc<HookEntry<E>>>>,
    next_id: AtomicU64,
}

impl<E: Event> std::fmt::Debug for EventDispatcher<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("hooks", &self.hooks.read().len())
            .finish()
    }
}

impl<E: Event> EventDispatcher<E> {
    pub fn new() -> Self {
        Self {
            hooks: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Registers a hook owned by `owner`. Returns the id needed to remove
    /// it individually.
    pub fn add_hook<F>(&self, priority: Priority, owner: &str, handler: F) -> HookId
    where
        F: Fn(&E) -> HookResult<E> + Send + Sync + 'static,
    {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = Arc::new(HookEntry {
            id,
            priority,
            owner: owner.to_string(),
            handler: Box::new(handler),
        });

        let mut hooks = self.hooks.write();
        // Ids are monotonic, so inserting after every entry of equal or
        // higher priority keeps the chain sorted by (priority, id).
        let pos = hooks.partition_point(|h| h.priority <= priority);
        hooks.insert(pos, entry);

        debug!(
            event = E::NAME,
            owner,
            ?priority,
            hook = id.0,
            "hook registered"
        );
        id
    }

    /// Removes the hook registered under `(id, owner)`.
    pub fn remove_hook(&self, id: HookId, owner: &str) -> Result<(), EventError> {
        let mut hooks = self.hooks.write();
        let pos = hooks
            .iter()
            .position(|h| h.id == id && h.owner == owner)
            .ok_or_else(|| EventError::HookNotFound {
                id,
                owner: owner.to_string(),
            })?;
        hooks.remove(pos);
        debug!(event = E::NAME, owner, hook = id.0, "hook removed");
        Ok(())
    }

    /// Removes every hook owned by `owner`. Returns how many were removed.
    pub fn remove_owned(&self, owner: &str) -> usize {
        let mut hooks = self.hooks.write();
        let before = hooks.len();
        hooks.retain(|h| h.owner != owner);
        before - hooks.len()
    }

    /// Whether any hook is registered under `owner`.
    pub fn has_owner(&self, owner: &str) -> bool {
        self.hooks.read().iter().any(|h| h.owner == owner)
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.read().len()
    }

    /// Runs the hook chain against one invocation's payload.
    ///
    /// For pure notification events the caller ignores the outcome; the
    /// chain still runs in full with the same isolation guarantees.
    pub fn dispatch(&self, event: &E) -> DispatchOutcome<E> {
        let chain: Vec<Arc<HookEntry<E>>> = self.hooks.read().clone();

        let mut current = event.clone();
        let mut replaced: Option<E::Override> = None;

        for entry in &chain {
            let result = panic::catch_unwind(AssertUnwindSafe(|| (entry.handler)(&current)));
            match result {
                Err(payload) => {
                    error!(
                        event = E::NAME,
                        owner = %entry.owner,
                        "hook panicked: {}",
                        panic_message(payload.as_ref())
                    );
                }
                Ok(Err(e)) => {
                    error!(event = E::NAME, owner = %entry.owner, "hook failed: {e}");
                }
                Ok(Ok(HookAction::Pass)) => {}
                Ok(Ok(HookAction::Veto)) => {
                    debug!(event = E::NAME, owner = %entry.owner, "event vetoed");
                    return DispatchOutcome::Vetoed;
                }
                Ok(Ok(HookAction::Replace(replacement))) => {
                    current = current.merge_override(replacement.clone());
                    replaced = Some(replacement);
                }
            }
        }

        match replaced {
            Some(replacement) => DispatchOutcome::Replaced(replacement),
            None => DispatchOutcome::Unchanged,
        }
    }
}

impl<E: Event> Default for EventDispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChatEvent, ClientCommandEvent};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn chat(message: &str) -> ChatEvent {
        ChatEvent {
            client: 0,
            message: message.to_string(),
            channel: "chat".to_string(),
        }
    }

    #[test]
    fn hooks_run_by_priority_then_registration_order() {
        let dispatcher = EventDispatcher::<ChatEvent>::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for (label, priority) in [
            ("low", Priority::Low),
            ("normal_a", Priority::Normal),
            ("high", Priority::High),
            ("normal_b", Priority::Normal),
        ] {
            let order = Arc::clone(&order);
            dispatcher.add_hook(priority, "test", move |_e| {
                order.lock().unwrap().push(label);
                Ok(HookAction::Pass)
            });
        }

        // Repeated passes over the same registration set must agree.
        for _ in 0..3 {
            order.lock().unwrap().clear();
            dispatcher.dispatch(&chat("hi"));
            assert_eq!(
                *order.lock().unwrap(),
                vec!["high", "normal_a", "normal_b", "low"]
            );
        }
    }

    #[test]
    fn veto_short_circuits_later_hooks() {
        // Scenario from the chat pipeline: A at HIGH passes, B at NORMAL
        // vetoes, C at LOW must never run.
        let dispatcher = EventDispatcher::<ChatEvent>::new();
        let invoked = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&invoked);
        dispatcher.add_hook(Priority::High, "a", move |_e| {
            log.lock().unwrap().push("a");
            Ok(HookAction::Pass)
        });
        let log = Arc::clone(&invoked);
        dispatcher.add_hook(Priority::Normal, "b", move |_e| {
            log.lock().unwrap().push("b");
            Ok(HookAction::Veto)
        });
        let log = Arc::clone(&invoked);
        dispatcher.add_hook(Priority::Low, "c", move |_e| {
            log.lock().unwrap().push("c");
            Ok(HookAction::Pass)
        });

        let outcome = dispatcher.dispatch(&chat("hi"));
        assert!(outcome.is_vetoed());
        assert_eq!(*invoked.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn replacement_feeds_later_hooks_and_final_outcome() {
        let dispatcher = EventDispatcher::<ClientCommandEvent>::new();

        dispatcher.add_hook(Priority::High, "rewriter", |_e| {
            Ok(HookAction::Replace("say filtered".to_string()))
        });
        let seen = Arc::new(Mutex::new(String::new()));
        let seen_by_low = Arc::clone(&seen);
        dispatcher.add_hook(Priority::Low, "observer", move |e: &ClientCommandEvent| {
            *seen_by_low.lock().unwrap() = e.command.clone();
            Ok(HookAction::Pass)
        });

        let outcome = dispatcher.dispatch(&ClientCommandEvent {
            client: 1,
            command: "say unfiltered".to_string(),
        });

        assert_eq!(*seen.lock().unwrap(), "say filtered");
        match outcome {
            DispatchOutcome::Replaced(cmd) => assert_eq!(cmd, "say filtered"),
            other => panic!("expected replacement, got {other:?}"),
        }
    }

    #[test]
    fn panicking_hook_does_not_abort_the_chain() {
        let dispatcher = EventDispatcher::<ChatEvent>::new();
        let ran_after = Arc::new(AtomicUsize::new(0));

        dispatcher.add_hook(Priority::High, "broken", |_e| -> HookResult<ChatEvent> {
            panic!("plugin bug")
        });
        let counter = Arc::clone(&ran_after);
        dispatcher.add_hook(Priority::Low, "survivor", move |_e| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(HookAction::Pass)
        });

        let outcome = dispatcher.dispatch(&chat("hi"));
        assert!(!outcome.is_vetoed());
        assert_eq!(ran_after.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn erroring_hook_is_treated_as_no_opinion() {
        let dispatcher = EventDispatcher::<ChatEvent>::new();
        dispatcher.add_hook(Priority::Normal, "flaky", |_e| -> HookResult<ChatEvent> {
            Err(EventError::HookFailed("backend offline".to_string()))
        });

        let outcome = dispatcher.dispatch(&chat("hi"));
        assert!(matches!(outcome, DispatchOutcome::Unchanged));
    }

    #[test]
    fn remove_hook_rejects_unknown_pairs() {
        let dispatcher = EventDispatcher::<ChatEvent>::new();
        let id = dispatcher.add_hook(Priority::Normal, "motd", |_e| Ok(HookAction::Pass));

        assert!(matches!(
            dispatcher.remove_hook(id, "someone_else"),
            Err(EventError::HookNotFound { .. })
        ));
        dispatcher.remove_hook(id, "motd").unwrap();
        assert_eq!(dispatcher.hook_count(), 0);
        assert!(matches!(
            dispatcher.remove_hook(id, "motd"),
            Err(EventError::HookNotFound { .. })
        ));
    }

    #[test]
    fn remove_owned_strips_exactly_one_owner() {
        let dispatcher = EventDispatcher::<ChatEvent>::new();
        dispatcher.add_hook(Priority::Normal, "a", |_e| Ok(HookAction::Pass));
        dispatcher.add_hook(Priority::High, "b", |_e| Ok(HookAction::Pass));
        dispatcher.add_hook(Priority::Low, "a", |_e| Ok(HookAction::Pass));

        assert_eq!(dispatcher.remove_owned("a"), 2);
        assert!(!dispatcher.has_owner("a"));
        assert!(dispatcher.has_owner("b"));
        assert_eq!(dispatcher.hook_count(), 1);
    }
}
