//! Command dispatch — static table, privilege checks, outcome-to-reply mapping.
//!
//! The table is constructed once at startup and passed into the engine by
//! value; there is no ambient command registry.

pub mod builtin;
pub mod calc;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::channels::{Channel, ContentKind};
use crate::config::BotConfig;
use crate::error::CommandError;
use crate::services::ContentServices;
use crate::store::Store;

/// Privilege required to run a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    None,
    Admin,
}

/// The built-in command set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinCommand {
    Help,
    Status,
    Time,
    Weather,
    Quote,
    Joke,
    Calc,
    Translate,
    Ping,
    Admin,
    Stats,
    AutoReply,
    Schedule,
    Broadcast,
    Block,
    Unblock,
}

/// One dispatch-table entry.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub command: BuiltinCommand,
    pub privilege: Privilege,
}

/// Static token → handler mapping.
pub struct CommandTable {
    commands: HashMap<&'static str, CommandSpec>,
}

impl CommandTable {
    /// The full built-in command set.
    pub fn builtin() -> Self {
        use BuiltinCommand::*;
        use Privilege::{Admin as AdminOnly, None as Anyone};

        let specs = [
            ("help", Help, Anyone),
            ("status", Status, Anyone),
            ("time", Time, Anyone),
            ("weather", Weather, Anyone),
            ("quote", Quote, Anyone),
            ("joke", Joke, Anyone),
            ("calc", Calc, Anyone),
            ("translate", Translate, Anyone),
            ("ping", Ping, Anyone),
            ("admin", Admin, AdminOnly),
            ("stats", Stats, AdminOnly),
            ("auto-reply", AutoReply, AdminOnly),
            ("schedule", Schedule, AdminOnly),
            ("broadcast", Broadcast, AdminOnly),
            ("block", Block, AdminOnly),
            ("unblock", Unblock, AdminOnly),
        ];

        let commands = specs
            .into_iter()
            .map(|(name, command, privilege)| {
                (
                    name,
                    CommandSpec {
                        name,
                        command,
                        privilege,
                    },
                )
            })
            .collect();

        Self { commands }
    }

    /// Lookup by exact lower-cased token (without the prefix character).
    pub fn get(&self, token: &str) -> Option<&CommandSpec> {
        self.commands.get(token)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// One classify-dispatch cycle's worth of command context. Not persisted.
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    /// Lower-cased command token, prefix character stripped.
    pub token: String,
    /// Whitespace-split tokens after the command word.
    pub args: Vec<String>,
    /// Invoking user's channel-native address.
    pub sender: String,
    /// Conversation the reply goes back to.
    pub conversation_id: String,
}

const ACCESS_DENIED: &str = "❌ Access denied. Admin privileges required.";
const GENERIC_FAILURE: &str = "❌ An error occurred while processing your command.";

/// Executes commands against the store/channel/services and converts every
/// outcome — success or failure — into exactly one reply.
pub struct Dispatcher {
    table: CommandTable,
    config: Arc<BotConfig>,
    store: Arc<dyn Store>,
    channel: Arc<dyn Channel>,
    services: Arc<dyn ContentServices>,
    started_at: Instant,
}

impl Dispatcher {
    pub fn new(
        table: CommandTable,
        config: Arc<BotConfig>,
        store: Arc<dyn Store>,
        channel: Arc<dyn Channel>,
        services: Arc<dyn ContentServices>,
    ) -> Self {
        Self {
            table,
            config,
            store,
            channel,
            services,
            started_at: Instant::now(),
        }
    }

    /// Run a command and send the resulting reply to the invoking
    /// conversation. Never propagates handler failures to the caller.
    pub async fn dispatch(&self, inv: &CommandInvocation) {
        let reply = self.handle(inv).await;

        if let Err(e) = self.channel.send(&inv.conversation_id, &reply).await {
            tracing::error!(
                command = %inv.token,
                conversation = %inv.conversation_id,
                "Failed to send command reply: {e}"
            );
            return;
        }

        if let Err(e) = self
            .store
            .log_message(
                &self.config.name,
                &inv.conversation_id,
                &reply,
                ContentKind::Text,
                true,
            )
            .await
        {
            tracing::warn!("Failed to log command reply: {e}");
        }
    }

    /// Resolve, privilege-check, and execute. Returns the reply text.
    pub async fn handle(&self, inv: &CommandInvocation) -> String {
        let Some(spec) = self.table.get(&inv.token) else {
            return format!(
                "❌ Unknown command: {}\nType /help to see available commands.",
                inv.token
            );
        };

        // Privilege gate: the handler body never runs for a missing or
        // non-admin user.
        if spec.privilege == Privilege::Admin {
            match self.store.get_user(&inv.sender).await {
                Ok(Some(user)) if user.is_admin => {}
                Ok(_) => {
                    tracing::debug!(
                        command = spec.name,
                        sender = %inv.sender,
                        "Admin command denied"
                    );
                    return ACCESS_DENIED.to_string();
                }
                Err(e) => {
                    tracing::error!(command = spec.name, "Privilege lookup failed: {e}");
                    return GENERIC_FAILURE.to_string();
                }
            }
        }

        match self.run(spec.command, inv).await {
            Ok(reply) => reply,
            Err(CommandError::Validation(usage)) => usage,
            Err(CommandError::PermissionDenied) => ACCESS_DENIED.to_string(),
            Err(CommandError::NotFound(reply)) => reply,
            Err(CommandError::Upstream(detail)) => {
                tracing::error!(command = spec.name, "Command failed: {detail}");
                GENERIC_FAILURE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_all_sixteen_commands() {
        let table = CommandTable::builtin();
        assert_eq!(table.len(), 16);
        for name in [
            "help",
            "status",
            "time",
            "weather",
            "quote",
            "joke",
            "calc",
            "translate",
            "ping",
            "admin",
            "stats",
            "auto-reply",
            "schedule",
            "broadcast",
            "block",
            "unblock",
        ] {
            assert!(table.get(name).is_some(), "missing command {name}");
        }
    }

    #[test]
    fn admin_commands_require_admin() {
        let table = CommandTable::builtin();
        for name in [
            "admin",
            "stats",
            "auto-reply",
            "schedule",
            "broadcast",
            "block",
            "unblock",
        ] {
            assert_eq!(table.get(name).unwrap().privilege, Privilege::Admin);
        }
        for name in ["help", "calc", "ping"] {
            assert_eq!(table.get(name).unwrap().privilege, Privilege::None);
        }
    }

    #[test]
    fn unknown_token_is_absent() {
        let table = CommandTable::builtin();
        assert!(table.get("nope").is_none());
        // Lookup is exact: tokens must already be lower-cased.
        assert!(table.get("HELP").is_none());
    }
}
