//! The callback surface the host calls into, one method per engine event.
//!
//! Every method is shielded: whatever goes wrong inside the extension
//! layer, the host gets a well-formed reply and keeps running. The replies
//! implement the return protocol: pass the action through, suppress it,
//! or substitute a rewritten payload.

use crate::configstring::{
    classify_transition, parse_variables, GamestateTransition, CS_SERVERINFO, GAMESTATE_KEY,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use strafe_event_system::{
    panic_message, ChatEvent, ClientCommandEvent, ClientId, ConsolePrintEvent, DispatchOutcome,
    DispatcherRegistry, Event, FrameEvent, GameCountdownEvent, MapChangeEvent, NewGameEvent,
    PlayerConnectEvent, PlayerDisconnectEvent, PlayerLoadedEvent, ServerCommandEvent,
    SetConfigstringEvent, TaskQueue,
};
use strafe_plugin_system::{CommandRegistry, CommandSource};
use tracing::{debug, error, warn};

/// Denial shown to a client whose connection was vetoed without a reason.
pub const DEFAULT_BAN_MESSAGE: &str = "You are banned from this server.";

/// Reply for events whose underlying action can be suppressed or rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventReply {
    /// Proceed with the original payload.
    Pass,
    /// Suppress the action entirely.
    Veto,
    /// Proceed with this payload instead.
    Replace(String),
}

/// Reply for a connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectReply {
    Allow,
    Deny(String),
}

/// The host-facing entry points of the extension layer.
///
/// All methods run synchronously on the thread the host calls from. The
/// bridge owns the configstring cache, which is what turns raw index-0
/// writes into gamestate transitions.
pub struct HostBridge {
    events: Arc<DispatcherRegistry>,
    commands: Arc<CommandRegistry>,
    tasks: Arc<TaskQueue>,
    configstrings: Mutex<HashMap<u16, String>>,
}

impl HostBridge {
    pub fn new(
        events: Arc<DispatcherRegistry>,
        commands: Arc<CommandRegistry>,
        tasks: Arc<TaskQueue>,
    ) -> Self {
        Self {
            events,
            commands,
            tasks,
            configstrings: Mutex::new(HashMap::new()),
        }
    }

    /// Last-resort containment for faults in the bridge itself. Hook and
    /// task faults are already contained a layer down.
    fn shielded<T>(&self, callback: &str, fallback: impl FnOnce() -> T, f: impl FnOnce() -> T) -> T {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => value,
            Err(payload) => {
                error!(
                    callback,
                    "extension layer panicked: {}",
                    panic_message(payload.as_ref())
                );
                fallback()
            }
        }
    }

    /// Dispatches if the event is registered; a missing dispatcher is a
    /// setup bug worth a log line, never a crash.
    fn dispatch<E: Event>(&self, event: &E) -> Option<DispatchOutcome<E>> {
        match self.events.dispatcher::<E>() {
            Ok(dispatcher) => Some(dispatcher.dispatch(event)),
            Err(e) => {
                error!(event = E::NAME, "dispatch skipped: {e}");
                None
            }
        }
    }

    fn reply<E>(outcome: Option<DispatchOutcome<E>>) -> EventReply
    where
        E: Event<Override = String>,
    {
        match outcome {
            Some(DispatchOutcome::Vetoed) => EventReply::Veto,
            Some(DispatchOutcome::Replaced(text)) => EventReply::Replace(text),
            Some(DispatchOutcome::Unchanged) | None => EventReply::Pass,
        }
    }

    /// One host frame: drain due tasks, then notify frame hooks. The drain
    /// is contained on its own, so the frame event still goes out even if
    /// the drain itself faults.
    pub fn on_frame(&self) {
        self.shielded("frame_drain", || (), || {
            self.tasks.drain_once();
        });
        self.shielded("frame", || (), || {
            let _ = self.dispatch(&FrameEvent);
        });
    }

    /// An rcon line. Routed to the command registry as console input.
    /// Returns whether a command matched.
    pub fn on_rcon(&self, line: &str) -> bool {
        self.shielded("rcon", || false, || {
            self.commands.handle_input(CommandSource::Console, line)
        })
    }

    pub fn on_chat(&self, client: ClientId, message: &str, channel: &str) -> EventReply {
        self.shielded("chat", || EventReply::Pass, || {
            Self::reply(self.dispatch(&ChatEvent {
                client,
                message: message.to_string(),
                channel: channel.to_string(),
            }))
        })
    }

    pub fn on_client_command(&self, client: ClientId, command: &str) -> EventReply {
        self.shielded("client_command", || EventReply::Pass, || {
            Self::reply(self.dispatch(&ClientCommandEvent {
                client,
                command: command.to_string(),
            }))
        })
    }

    pub fn on_server_command(&self, client: Option<ClientId>, command: &str) -> EventReply {
        self.shielded("server_command", || EventReply::Pass, || {
            Self::reply(self.dispatch(&ServerCommandEvent {
                client,
                command: command.to_string(),
            }))
        })
    }

    pub fn on_new_game(&self, restart: bool) {
        self.shielded("new_game", || (), || {
            let _ = self.dispatch(&NewGameEvent { restart });
        });
    }

    pub fn on_map_change(&self, map: &str, factory: &str) {
        self.shielded("map", || (), || {
            let _ = self.dispatch(&MapChangeEvent {
                map: map.to_string(),
                factory: factory.to_string(),
            });
        });
    }

    /// The server is about to write a configstring.
    ///
    /// Hooks may veto or rewrite the value. Index 0 is the serverinfo blob;
    /// an accepted write there is compared against the cached one and a
    /// `PRE_GAME -> COUNT_DOWN` gamestate change fires the countdown event.
    /// The cache only ever holds values the host actually went on to write.
    pub fn on_set_configstring(&self, index: u16, value: &str) -> EventReply {
        self.shielded("set_configstring", || EventReply::Pass, || {
            let Some(outcome) = self.dispatch(&SetConfigstringEvent {
                index,
                value: value.to_string(),
            }) else {
                return EventReply::Pass;
            };
            if outcome.is_vetoed() {
                return EventReply::Veto;
            }

            let accepted = match &outcome {
                DispatchOutcome::Replaced(replacement) => replacement.clone(),
                _ => value.to_string(),
            };

            if index == CS_SERVERINFO {
                let previous = self.configstrings.lock().get(&index).cloned();
                self.track_gamestate(previous.as_deref().unwrap_or(""), &accepted);
            }
            self.configstrings.lock().insert(index, accepted);

            match outcome {
                DispatchOutcome::Replaced(replacement) => EventReply::Replace(replacement),
                _ => EventReply::Pass,
            }
        })
    }

    fn track_gamestate(&self, old_blob: &str, new_blob: &str) {
        let old_state = parse_variables(old_blob)
            .remove(GAMESTATE_KEY)
            .unwrap_or_default();
        let new_state = parse_variables(new_blob)
            .remove(GAMESTATE_KEY)
            .unwrap_or_default();
        if old_state == new_state || old_state.is_empty() || new_state.is_empty() {
            return;
        }

        debug!(from = %old_state, to = %new_state, "gamestate changed");
        match classify_transition(&old_state, &new_state) {
            GamestateTransition::Countdown => {
                let _ = self.dispatch(&GameCountdownEvent);
            }
            GamestateTransition::Silent => {}
            GamestateTransition::Unknown => {
                warn!(from = %old_state, to = %new_state, "unknown gamestate transition");
            }
        }
    }

    /// A connection attempt. A veto denies with the stock ban message; a
    /// replacement denies with the hook's reason.
    pub fn on_player_connect(&self, client: ClientId, is_bot: bool) -> ConnectReply {
        self.shielded("player_connect", || ConnectReply::Allow, || {
            match self.dispatch(&PlayerConnectEvent { client, is_bot }) {
                Some(DispatchOutcome::Vetoed) => {
                    ConnectReply::Deny(DEFAULT_BAN_MESSAGE.to_string())
                }
                Some(DispatchOutcome::Replaced(reason)) => ConnectReply::Deny(reason),
                Some(DispatchOutcome::Unchanged) | None => ConnectReply::Allow,
            }
        })
    }

    pub fn on_player_loaded(&self, client: ClientId) {
        self.shielded("player_loaded", || (), || {
            let _ = self.dispatch(&PlayerLoadedEvent { client });
        });
    }

    pub fn on_player_disconnect(&self, client: ClientId, reason: &str) {
        self.shielded("player_disconnect", || (), || {
            let _ = self.dispatch(&PlayerDisconnectEvent {
                client,
                reason: reason.to_string(),
            });
        });
    }

    /// A raw console line from the engine. Decoded lossily, trimmed; blank
    /// lines never reach hooks.
    pub fn on_console_print(&self, raw: &[u8]) -> EventReply {
        self.shielded("console_print", || EventReply::Pass, || {
            let text = String::from_utf8_lossy(raw);
            let text = text.trim();
            if text.is_empty() {
                return EventReply::Pass;
            }
            debug!(target: "console", "{text}");
            Self::reply(self.dispatch(&ConsolePrintEvent {
                text: text.to_string(),
            }))
        })
    }

    /// The cached value of a configstring, if one was accepted.
    pub fn configstring(&self, index: u16) -> Option<String> {
        self.configstrings.lock().get(&index).cloned()
    }
}
