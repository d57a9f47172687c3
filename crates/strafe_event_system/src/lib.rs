//! # Strafe Event System
//!
//! The dispatch core of the Strafe extension layer: named events, plugin-owned
//! hooks with deterministic priority ordering, and a cross-thread task queue
//! drained once per host frame.
//!
//! ## Architecture
//!
//! - [`events`] defines the [`Event`](events::Event) trait and the built-in
//!   payload types reported by the host.
//! - [`dispatcher`] runs one event's hook chain and aggregates a
//!   [`DispatchOutcome`](dispatcher::DispatchOutcome): pass through unchanged,
//!   carry a replacement payload, or veto the underlying host action.
//! - [`registry`] holds the fixed set of dispatchers created at startup,
//!   looked up by event name.
//! - [`sched`] is the task queue: any thread may enqueue, only the frame
//!   handler drains.
//!
//! ## Failure isolation
//!
//! One misbehaving extension must never take down the event pipeline or the
//! host callback. Every hook and task invocation is wrapped so that panics
//! and handler errors are caught, logged with their owning plugin, and
//! treated as "no opinion". Nothing in this crate propagates a plugin fault
//! to its caller.
//!
//! ## Threading model
//!
//! Dispatch and drain run synchronously on the single thread the host calls
//! back on. Hook chains and the registry are only mutated from that thread;
//! the task queue is the one structure written from arbitrary worker threads.

pub mod dispatcher;
pub mod error;
pub mod events;
pub mod registry;
pub mod sched;

pub use dispatcher::{DispatchOutcome, EventDispatcher, HookAction, HookId, HookResult, Priority};
pub use error::{panic_message, EventError};
pub use events::{
    register_builtin, ChatEvent, ClientCommandEvent, ClientId, ConsolePrintEvent, Event,
    FrameEvent, GameCountdownEvent, MapChangeEvent, NewGameEvent, PlayerConnectEvent,
    PlayerDisconnectEvent, PlayerLoadedEvent, PluginUnloadEvent, ServerCommandEvent,
    SetConfigstringEvent,
};
pub use registry::DispatcherRegistry;
pub use sched::{spawn_worker, TaskQueue};
