//! Error types for the event dispatch layer.

use crate::dispatcher::HookId;
use std::any::Any;
use thiserror::Error;

/// Errors surfaced by dispatchers and the dispatcher registry.
///
/// Hook faults (panics or handler errors during dispatch) are deliberately
/// absent here: they are contained at the point of invocation and logged,
/// never returned to the caller of `dispatch`.
#[derive(Debug, Error)]
pub enum EventError {
    /// A dispatcher was requested for an event name that was never
    /// registered with the [`DispatcherRegistry`](crate::DispatcherRegistry).
    #[error("unknown event '{0}'")]
    UnknownEvent(String),

    /// The registry holds a dispatcher under this name, but for a different
    /// payload type than the one requested.
    #[error("event '{0}' is registered with a different payload type")]
    TypeMismatch(&'static str),

    /// Hook removal was requested for a hook that is not registered under
    /// the given owner.
    #[error("no hook {id:?} owned by '{owner}'")]
    HookNotFound {
        /// The identifier returned by `add_hook`.
        id: HookId,
        /// The plugin that was named as the hook's owner.
        owner: String,
    },

    /// A hook handler reported a failure. Handlers may build this with `?`
    /// to abort their own work; the dispatcher logs it and moves on to the
    /// next hook.
    #[error("hook execution failed: {0}")]
    HookFailed(String),
}

/// Extracts a printable message from a caught panic payload.
///
/// Used everywhere a plugin-provided callable is wrapped in `catch_unwind`
/// so the log line carries the panic text instead of `Any { .. }`.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
