//! Event kinds reported by the host, and the [`Event`] trait they implement.
//!
//! Every event is a named kind with a fixed payload shape. The name is the
//! registry key; the payload is what hooks receive. Events that support
//! overrides declare the payload a hook may substitute via
//! [`Event::Override`]: for the command/text events that is the rewritten
//! string, and for pure notifications it is the event itself (the outcome is
//! advisory only).

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Host client slot number.
pub type ClientId = i32;

/// A named kind of occurrence the host reports exactly once per occurrence.
///
/// Implementations are plain data: cheap to clone, `Send + Sync`, and
/// serializable so plugins can log or persist them.
pub trait Event: Clone + Send + Sync + Debug + 'static {
    /// Registry key for this event kind.
    const NAME: &'static str;

    /// Replacement payload a hook may produce for the rest of the chain.
    type Override: Clone + Send + Sync + Debug + 'static;

    /// Folds a hook's replacement into the payload subsequent hooks observe.
    fn merge_override(&self, replacement: Self::Override) -> Self;
}

/// A chat message, already stripped of its `say`/`say_team` wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEvent {
    pub client: ClientId,
    pub message: String,
    /// Channel label, e.g. "chat" or "red_team_chat".
    pub channel: String,
}

impl Event for ChatEvent {
    const NAME: &'static str = "chat";
    type Override = String;

    fn merge_override(&self, replacement: String) -> Self {
        Self {
            message: replacement,
            ..self.clone()
        }
    }
}

/// A raw command issued by a connected client ("say", "score", ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCommandEvent {
    pub client: ClientId,
    pub command: String,
}

impl Event for ClientCommandEvent {
    const NAME: &'static str = "client_command";
    type Override = String;

    fn merge_override(&self, replacement: String) -> Self {
        Self {
            client: self.client,
            command: replacement,
        }
    }
}

/// A command the server is about to send to a client, or to everyone when
/// `client` is `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCommandEvent {
    pub client: Option<ClientId>,
    pub command: String,
}

impl Event for ServerCommandEvent {
    const NAME: &'static str = "server_command";
    type Override = String;

    fn merge_override(&self, replacement: String) -> Self {
        Self {
            client: self.client,
            command: replacement,
        }
    }
}

/// One host frame. Dispatched after the task queue drain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FrameEvent;

impl Event for FrameEvent {
    const NAME: &'static str = "frame";
    type Override = Self;

    fn merge_override(&self, replacement: Self) -> Self {
        replacement
    }
}

/// A new game started, either from a map load or a restart.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NewGameEvent {
    pub restart: bool,
}

impl Event for NewGameEvent {
    const NAME: &'static str = "new_game";
    type Override = Self;

    fn merge_override(&self, replacement: Self) -> Self {
        replacement
    }
}

/// A map finished loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapChangeEvent {
    pub map: String,
    pub factory: String,
}

impl Event for MapChangeEvent {
    const NAME: &'static str = "map";
    type Override = Self;

    fn merge_override(&self, replacement: Self) -> Self {
        replacement
    }
}

/// The server is about to set a configstring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetConfigstringEvent {
    pub index: u16,
    pub value: String,
}

impl Event for SetConfigstringEvent {
    const NAME: &'static str = "set_configstring";
    type Override = String;

    fn merge_override(&self, replacement: String) -> Self {
        Self {
            index: self.index,
            value: replacement,
        }
    }
}

/// The pre-game countdown started. No payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GameCountdownEvent;

impl Event for GameCountdownEvent {
    const NAME: &'static str = "game_countdown";
    type Override = Self;

    fn merge_override(&self, replacement: Self) -> Self {
        replacement
    }
}

/// A player is trying to connect.
///
/// The override is the denial message shown to the client, not a rewrite of
/// the connect arguments: hooks that produce one leave the arguments as-is
/// for the rest of the chain, and the bridge turns the final override into
/// a connection refusal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConnectEvent {
    pub client: ClientId,
    pub is_bot: bool,
}

impl Event for PlayerConnectEvent {
    const NAME: &'static str = "player_connect";
    type Override = String;

    fn merge_override(&self, _replacement: String) -> Self {
        self.clone()
    }
}

/// A player finished loading into the game. Does not trigger for bots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlayerLoadedEvent {
    pub client: ClientId,
}

impl Event for PlayerLoadedEvent {
    const NAME: &'static str = "player_loaded";
    type Override = Self;

    fn merge_override(&self, replacement: Self) -> Self {
        replacement
    }
}

/// A player disconnected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDisconnectEvent {
    pub client: ClientId,
    pub reason: String,
}

impl Event for PlayerDisconnectEvent {
    const NAME: &'static str = "player_disconnect";
    type Override = Self;

    fn merge_override(&self, replacement: Self) -> Self {
        replacement
    }
}

/// A line the server printed to its console.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolePrintEvent {
    pub text: String,
}

impl Event for ConsolePrintEvent {
    const NAME: &'static str = "console_print";
    type Override = String;

    fn merge_override(&self, replacement: String) -> Self {
        Self { text: replacement }
    }
}

/// A plugin is about to be unloaded. Dispatched before its registrations
/// are removed, so the plugin's own hooks still see it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginUnloadEvent {
    pub plugin: String,
}

impl Event for PluginUnloadEvent {
    const NAME: &'static str = "plugin_unload";
    type Override = Self;

    fn merge_override(&self, replacement: Self) -> Self {
        replacement
    }
}

/// Registers one dispatcher per built-in event kind.
///
/// Called once at startup; the handler bridge and the plugin lifecycle
/// manager look these up by name and fail with
/// [`EventError::UnknownEvent`](crate::EventError::UnknownEvent) if this
/// step was skipped.
pub fn register_builtin(registry: &crate::DispatcherRegistry) {
    registry.register::<ChatEvent>();
    registry.register::<ClientCommandEvent>();
    registry.register::<ServerCommandEvent>();
    registry.register::<FrameEvent>();
    registry.register::<NewGameEvent>();
    registry.register::<MapChangeEvent>();
    registry.register::<SetConfigstringEvent>();
    registry.register::<GameCountdownEvent>();
    registry.register::<PlayerConnectEvent>();
    registry.register::<PlayerLoadedEvent>();
    registry.register::<PlayerDisconnectEvent>();
    registry.register::<ConsolePrintEvent>();
    registry.register::<PluginUnloadEvent>();
}
