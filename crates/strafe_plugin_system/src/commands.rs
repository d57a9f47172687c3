//! Named commands plugins expose to the console and to players.
//!
//! Console input reaches a command either bare (`balance`) or prefixed
//! (`!balance`); player chat only triggers commands through the prefix.
//! Command names are matched case-insensitively.

use crate::error::PluginError;
use parking_lot::RwLock;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use strafe_event_system::{panic_message, ClientId};
use tracing::{debug, error};

/// Where a command invocation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    /// The server console, including rcon.
    Console,
    /// A connected client, via chat.
    Client(ClientId),
}

/// One parsed invocation handed to a command handler.
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    pub source: CommandSource,
    /// The matched command name, lowercased.
    pub name: String,
    /// Whitespace-split arguments after the name.
    pub args: Vec<String>,
    /// The full input line as received, prefix included.
    pub raw: String,
}

type CommandHandler = Box<dyn Fn(&CommandInvocation) + Send + Sync>;

struct CommandEntry {
    name: String,
    owner: String,
    handler: CommandHandler,
}

/// Registry of every command currently exposed by loaded plugins.
pub struct CommandRegistry {
    prefix: String,
    commands: RwLock<Vec<Arc<CommandEntry>>>,
}

impl CommandRegistry {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            commands: RwLock::new(Vec::new()),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Registers a command owned by `owner`. Names are unique across all
    /// plugins; a clash is the registering plugin's error to handle.
    pub fn register<F>(&self, name: &str, owner: &str, handler: F) -> Result<(), PluginError>
    where
        F: Fn(&CommandInvocation) + Send + Sync + 'static,
    {
        let mut commands = self.commands.write();
        if let Some(existing) = commands
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
        {
            return Err(PluginError::DuplicateCommand {
                name: name.to_string(),
                owner: existing.owner.clone(),
            });
        }
        commands.push(Arc::new(CommandEntry {
            name: name.to_ascii_lowercase(),
            owner: owner.to_string(),
            handler: Box::new(handler),
        }));
        debug!(command = name, owner, "command registered");
        Ok(())
    }

    /// Removes the command registered under `(name, owner)`.
    pub fn remove(&self, name: &str, owner: &str) -> Result<(), PluginError> {
        let mut commands = self.commands.write();
        let pos = commands
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name) && c.owner == owner)
            .ok_or_else(|| PluginError::UnknownCommand(name.to_string()))?;
        commands.remove(pos);
        Ok(())
    }

    /// Removes every command owned by `owner`. Returns how many were
    /// removed.
    pub fn remove_owned(&self, owner: &str) -> usize {
        let mut commands = self.commands.write();
        let before = commands.len();
        commands.retain(|c| c.owner != owner);
        before - commands.len()
    }

    pub fn command_count(&self) -> usize {
        self.commands.read().len()
    }

    /// Names of every registered command, sorted.
    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.read().iter().map(|c| c.name.clone()).collect();
        names.sort();
        names
    }

    /// Parses `line` and runs the matching command, if any.
    ///
    /// Returns whether a command matched. A handler that panics is logged
    /// with its owner and still counts as a match; its fault never reaches
    /// the caller.
    pub fn handle_input(&self, source: CommandSource, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return false;
        }

        let body = match source {
            // Console input works with or without the prefix.
            CommandSource::Console => line.strip_prefix(&self.prefix).unwrap_or(line),
            // Players must use the prefix, so ordinary chat stays chat.
            CommandSource::Client(_) => match line.strip_prefix(&self.prefix) {
                Some(rest) => rest,
                None => return false,
            },
        };

        let mut parts = body.split_whitespace();
        let Some(name) = parts.next() else {
            return false;
        };
        let name = name.to_ascii_lowercase();
        let args: Vec<String> = parts.map(str::to_string).collect();

        // Snapshot the entry before calling so the handler may register or
        // remove commands on this registry without deadlocking.
        let entry = {
            let commands = self.commands.read();
            commands.iter().find(|c| c.name == name).cloned()
        };
        let Some(entry) = entry else {
            return false;
        };

        let invocation = CommandInvocation {
            source,
            name,
            args,
            raw: line.to_string(),
        };

        if let Err(payload) =
            panic::catch_unwind(AssertUnwindSafe(|| (entry.handler)(&invocation)))
        {
            error!(
                command = %invocation.name,
                owner = %entry.owner,
                "command handler panicked: {}",
                panic_message(payload.as_ref())
            );
        }
        true
    }
}
