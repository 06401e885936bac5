//! The built-in command handlers.
//!
//! Each handler validates its arguments, performs at most one state
//! mutation, and returns exactly one reply — except `ping`, which sends an
//! immediate acknowledgment before returning the latency readout.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local, NaiveDateTime, Utc};

use crate::channels::ContentKind;
use crate::commands::{BuiltinCommand, CommandInvocation, Dispatcher};
use crate::error::{CommandError, ServiceError};
use crate::procinfo::{format_uptime, process_memory_mb};

const HELP_TEXT: &str = "🤖 Courier Commands\n\n\
    Basic Commands:\n\
    /help - Show this help message\n\
    /status - Check bot status\n\
    /time - Get current time\n\
    /weather [city] - Get weather information\n\
    /quote - Get a random inspirational quote\n\
    /joke - Get a random joke\n\
    /calc [expression] - Calculate math expressions\n\
    /translate [text] - Translate text to English\n\
    /ping - Check bot response time\n\n\
    Admin Commands:\n\
    /admin - Access admin panel\n\
    /stats - View bot statistics\n\
    /auto-reply [trigger] [reply] - Add auto-reply\n\
    /schedule [time] [message] - Schedule a message\n\
    /broadcast [message] - Broadcast message to all conversations\n\
    /block [address] - Block a user\n\
    /unblock [address] - Unblock a user";

impl Dispatcher {
    pub(super) async fn run(
        &self,
        command: BuiltinCommand,
        inv: &CommandInvocation,
    ) -> Result<String, CommandError> {
        match command {
            BuiltinCommand::Help => Ok(HELP_TEXT.to_string()),
            BuiltinCommand::Status => Ok(self.status_reply()),
            BuiltinCommand::Time => Ok(time_reply()),
            BuiltinCommand::Weather => self.weather(inv).await,
            BuiltinCommand::Quote => Ok(self.quote().await),
            BuiltinCommand::Joke => Ok(self.joke().await),
            BuiltinCommand::Calc => calc(inv),
            BuiltinCommand::Translate => self.translate(inv).await,
            BuiltinCommand::Ping => self.ping(inv).await,
            BuiltinCommand::Admin => self.admin_panel(inv).await,
            BuiltinCommand::Stats => self.stats().await,
            BuiltinCommand::AutoReply => self.add_auto_reply(inv).await,
            BuiltinCommand::Schedule => self.schedule(inv).await,
            BuiltinCommand::Broadcast => self.broadcast(inv).await,
            BuiltinCommand::Block => self.set_blocked(inv, true).await,
            BuiltinCommand::Unblock => self.set_blocked(inv, false).await,
        }
    }

    fn status_reply(&self) -> String {
        format!(
            "🤖 Bot Status\n\n\
             Status: 🟢 Online\n\
             Uptime: {}\n\
             Memory Usage: {} MB\n\
             Version: {}",
            format_uptime(self.started_at.elapsed()),
            process_memory_mb(),
            env!("CARGO_PKG_VERSION"),
        )
    }

    async fn weather(&self, inv: &CommandInvocation) -> Result<String, CommandError> {
        if inv.args.is_empty() {
            return Err(CommandError::Validation(
                "❌ Please provide a city name.\nUsage: /weather [city]".into(),
            ));
        }
        let city = inv.args.join(" ");

        match self.services.weather(&city).await {
            Ok(report) => Ok(report),
            Err(ServiceError::NotConfigured(_)) => {
                Ok("❌ Weather API key not configured.".to_string())
            }
            Err(e) => {
                tracing::error!(city = %city, "Weather lookup failed: {e}");
                Ok("❌ Could not fetch weather data. Please check the city name.".to_string())
            }
        }
    }

    async fn quote(&self) -> String {
        match self.services.quote().await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Quote lookup failed: {e}");
                "❌ Could not fetch a quote at the moment.".to_string()
            }
        }
    }

    async fn joke(&self) -> String {
        match self.services.joke().await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Joke lookup failed: {e}");
                "❌ Could not fetch a joke at the moment.".to_string()
            }
        }
    }

    async fn translate(&self, inv: &CommandInvocation) -> Result<String, CommandError> {
        if inv.args.is_empty() {
            return Err(CommandError::Validation(
                "❌ Please provide text to translate.\nUsage: /translate [text]".into(),
            ));
        }
        let text = inv.args.join(" ");

        match self.services.translate(&text).await {
            Ok(reply) => Ok(reply),
            Err(ServiceError::NotConfigured(_)) => {
                Ok("❌ Translation service not configured.".to_string())
            }
            Err(e) => {
                tracing::error!("Translation failed: {e}");
                Ok("❌ Could not translate the text. Please try again.".to_string())
            }
        }
    }

    /// The only handler that sends two messages: the acknowledgment first,
    /// then the measured latency.
    async fn ping(&self, inv: &CommandInvocation) -> Result<String, CommandError> {
        let start = Instant::now();
        self.channel
            .send(&inv.conversation_id, "🏓 Pong!")
            .await
            .map_err(CommandError::from)?;
        let latency = start.elapsed().as_millis();

        // The acknowledgment bypasses the dispatcher's reply path, so it is
        // logged here to keep the message log complete.
        if let Err(e) = self
            .store
            .log_message(
                &self.config.name,
                &inv.conversation_id,
                "🏓 Pong!",
                ContentKind::Text,
                true,
            )
            .await
        {
            tracing::warn!("Failed to log ping acknowledgment: {e}");
        }

        Ok(format!("⚡ Response time: {latency}ms"))
    }

    async fn admin_panel(&self, inv: &CommandInvocation) -> Result<String, CommandError> {
        let user = self.store.get_user(&inv.sender).await?;
        let name = user
            .and_then(|u| u.name)
            .unwrap_or_else(|| inv.sender.clone());

        Ok(format!(
            "👑 Admin Panel\n\n\
             Welcome, {name}!\n\n\
             Admin Commands:\n\
             /stats - View bot statistics\n\
             /auto-reply [trigger] [reply] - Add auto-reply\n\
             /schedule [time] [message] - Schedule a message\n\
             /broadcast [message] - Broadcast message to all conversations\n\
             /block [address] - Block a user\n\
             /unblock [address] - Unblock a user"
        ))
    }

    async fn stats(&self) -> Result<String, CommandError> {
        let stats = self.store.get_stats().await?;

        Ok(format!(
            "📊 Bot Statistics\n\n\
             Total Users: {}\n\
             Total Messages: {}\n\
             Active Auto-replies: {}\n\
             Pending Scheduled Messages: {}\n\
             Bot Uptime: {}\n\
             Memory Usage: {} MB",
            stats.total_users,
            stats.total_messages,
            stats.active_auto_replies,
            stats.pending_scheduled,
            format_uptime(self.started_at.elapsed()),
            process_memory_mb(),
        ))
    }

    async fn add_auto_reply(&self, inv: &CommandInvocation) -> Result<String, CommandError> {
        if inv.args.len() < 2 {
            return Err(CommandError::Validation(
                "❌ Usage: /auto-reply [trigger] [reply]\n\
                 Example: /auto-reply hello Hi there! How can I help you?"
                    .into(),
            ));
        }

        let trigger = &inv.args[0];
        let reply = inv.args[1..].join(" ");
        self.store.add_auto_reply(trigger, &reply).await?;

        Ok(format!(
            "✅ Auto-reply added successfully!\nTrigger: \"{trigger}\"\nReply: \"{reply}\""
        ))
    }

    async fn schedule(&self, inv: &CommandInvocation) -> Result<String, CommandError> {
        const USAGE: &str = "❌ Usage: /schedule [time] [message]\n\
             Example: /schedule 2024-01-01 12:00:00 Happy New Year!";

        if inv.args.len() < 2 {
            return Err(CommandError::Validation(USAGE.into()));
        }

        let Some((when, consumed)) = parse_schedule_time(&inv.args) else {
            return Err(CommandError::Validation(
                "❌ Invalid date format. Use: YYYY-MM-DD HH:MM:SS".into(),
            ));
        };

        let message = inv.args[consumed..].join(" ");
        if message.is_empty() {
            return Err(CommandError::Validation(USAGE.into()));
        }

        self.store
            .add_scheduled_message(&inv.conversation_id, &message, when)
            .await?;

        Ok(format!(
            "✅ Message scheduled for {}",
            when.format("%Y-%m-%d %H:%M:%S UTC")
        ))
    }

    async fn broadcast(&self, inv: &CommandInvocation) -> Result<String, CommandError> {
        if inv.args.is_empty() {
            return Err(CommandError::Validation(
                "❌ Usage: /broadcast [message]\nExample: /broadcast Important announcement!"
                    .into(),
            ));
        }

        let text = format!("📢 Broadcast Message\n\n{}", inv.args.join(" "));
        let conversations = self.channel.list_conversations().await?;
        let timeout = self.config.send_timeout;

        // Fan-out with per-item error capture. A failed or stalled recipient
        // never aborts the remaining sends.
        let attempts = conversations.into_iter().map(|conversation| {
            let channel = Arc::clone(&self.channel);
            let text = text.clone();
            async move {
                match tokio::time::timeout(timeout, channel.send(&conversation, &text)).await {
                    Ok(Ok(())) => true,
                    Ok(Err(e)) => {
                        tracing::warn!(conversation = %conversation, "Broadcast send failed: {e}");
                        false
                    }
                    Err(_) => {
                        tracing::warn!(conversation = %conversation, "Broadcast send timed out");
                        false
                    }
                }
            }
        });

        let results = futures::future::join_all(attempts).await;
        let success = results.iter().filter(|ok| **ok).count();
        let fail = results.len() - success;

        Ok(format!(
            "📢 Broadcast completed!\n✅ Sent: {success}\n❌ Failed: {fail}"
        ))
    }

    async fn set_blocked(
        &self,
        inv: &CommandInvocation,
        blocked: bool,
    ) -> Result<String, CommandError> {
        let verb = if blocked { "block" } else { "unblock" };
        if inv.args.is_empty() {
            return Err(CommandError::Validation(format!(
                "❌ Usage: /{verb} [address]\nExample: /{verb} +1234567890"
            )));
        }

        let address = &inv.args[0];
        if self.store.get_user(address).await?.is_none() {
            return Err(CommandError::NotFound(format!(
                "❌ User {address} not found."
            )));
        }

        self.store.set_blocked(address, blocked).await?;
        let effect = if blocked { "blocked" } else { "unblocked" };
        Ok(format!("✅ User {address} has been {effect}."))
    }
}

fn time_reply() -> String {
    let now_utc = Utc::now();
    let now_local = Local::now();

    format!(
        "🕐 Current Time\n\n\
         Local Time: {}\n\
         UTC Time: {}\n\
         Timezone: UTC{}",
        now_local.format("%Y-%m-%d %H:%M:%S"),
        now_utc.format("%Y-%m-%d %H:%M:%S"),
        now_local.format("%:z"),
    )
}

fn calc(inv: &CommandInvocation) -> Result<String, CommandError> {
    use crate::commands::calc::{evaluate, format_result, is_allowed};

    if inv.args.is_empty() {
        return Err(CommandError::Validation(
            "❌ Please provide a math expression.\n\
             Usage: /calc [expression]\nExample: /calc 2+2*3"
                .into(),
        ));
    }

    let expression = inv.args.join(" ");

    // Hard gate before any evaluation.
    if !is_allowed(&expression) {
        return Ok(
            "❌ Invalid characters in expression. Only numbers and basic operators are allowed."
                .to_string(),
        );
    }

    match evaluate(&expression) {
        Ok(value) => Ok(format!(
            "🧮 Calculation Result\n\n{expression} = {}",
            format_result(value)
        )),
        Err(_) => Ok("❌ Invalid math expression. Please check your input.".to_string()),
    }
}

/// Parse the leading timestamp of a `/schedule` invocation.
///
/// Accepts the two-token `YYYY-MM-DD HH:MM:SS` form, a single-token
/// `YYYY-MM-DDTHH:MM:SS`, or full RFC 3339. Naive times are taken as UTC.
/// Returns the instant and how many argument tokens it consumed.
fn parse_schedule_time(args: &[String]) -> Option<(DateTime<Utc>, usize)> {
    if args.len() >= 2 {
        let joined = format!("{} {}", args[0], args[1]);
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&joined, "%Y-%m-%d %H:%M:%S") {
            return Some((ndt.and_utc(), 2));
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(&args[0]) {
        return Some((dt.with_timezone(&Utc), 1));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(&args[0], "%Y-%m-%dT%H:%M:%S") {
        return Some((ndt.and_utc(), 1));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn schedule_time_two_token_form() {
        let args = strings(&["2024-01-01", "12:00:00", "Happy", "New", "Year!"]);
        let (when, consumed) = parse_schedule_time(&args).unwrap();
        assert_eq!(consumed, 2);
        assert_eq!(when.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-01-01 12:00:00");
    }

    #[test]
    fn schedule_time_single_token_forms() {
        let args = strings(&["2024-01-01T12:00:00", "hi"]);
        let (_, consumed) = parse_schedule_time(&args).unwrap();
        assert_eq!(consumed, 1);

        let args = strings(&["2024-01-01T12:00:00Z", "hi"]);
        let (when, consumed) = parse_schedule_time(&args).unwrap();
        assert_eq!(consumed, 1);
        assert_eq!(when.format("%H:%M").to_string(), "12:00");
    }

    #[test]
    fn schedule_time_rejects_garbage() {
        assert!(parse_schedule_time(&strings(&["tomorrow", "hi"])).is_none());
        assert!(parse_schedule_time(&strings(&["2024-13-99", "hi"])).is_none());
    }
}
