//! The message-handling engine.
//!
//! Consumes the channel's inbound stream and drives each message through the
//! fixed triage pipeline: record the sender, drop blocked users, classify,
//! then route to the command dispatcher, the media handler, or the text
//! stages (auto-reply, greeting, help fallback).

use std::sync::Arc;

use futures::StreamExt;

use crate::autoreply::AutoReplyMatcher;
use crate::channels::{Channel, ContentKind, IncomingMessage};
use crate::commands::{CommandInvocation, Dispatcher};
use crate::config::BotConfig;
use crate::engine::classifier::{classify, Category};
use crate::engine::media::MediaHandler;
use crate::error::Error;
use crate::store::Store;

pub struct Engine {
    config: Arc<BotConfig>,
    store: Arc<dyn Store>,
    channel: Arc<dyn Channel>,
    dispatcher: Arc<Dispatcher>,
    matcher: AutoReplyMatcher,
    media: MediaHandler,
}

impl Engine {
    pub fn new(
        config: Arc<BotConfig>,
        store: Arc<dyn Store>,
        channel: Arc<dyn Channel>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        let matcher = AutoReplyMatcher::new(Arc::clone(&store));
        let media = MediaHandler::new(config.uploads_dir.clone());
        Self {
            config,
            store,
            channel,
            dispatcher,
            matcher,
            media,
        }
    }

    /// Start the channel and handle inbound messages until the stream ends.
    /// Each message is handled on its own task so a slow handler never
    /// stalls the stream.
    pub async fn run(self: Arc<Self>) -> Result<(), Error> {
        let mut stream = self.channel.start().await.map_err(Error::from)?;
        tracing::info!(channel = self.channel.name(), "Engine started");

        while let Some(message) = stream.next().await {
            let engine = Arc::clone(&self);
            tokio::spawn(async move {
                engine.handle_message(message).await;
            });
        }

        tracing::info!("Inbound stream closed");
        Ok(())
    }

    /// One full triage cycle. Failures are logged, never propagated — a bad
    /// message must not take the engine down.
    pub async fn handle_message(&self, message: IncomingMessage) {
        if let Err(e) = self.record_sender(&message).await {
            tracing::error!(sender = %message.sender, "Failed to record sender: {e}");
            return;
        }

        // Blocked users are recorded but never answered.
        match self.store.get_user(&message.sender).await {
            Ok(Some(user)) if user.is_blocked => {
                tracing::debug!(sender = %message.sender, "Dropping message from blocked user");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(sender = %message.sender, "Blocked-state lookup failed: {e}");
                return;
            }
        }

        match classify(&message) {
            Category::Command { token, args } => {
                let invocation = CommandInvocation {
                    token,
                    args,
                    sender: message.sender.clone(),
                    conversation_id: message.conversation_id.clone(),
                };
                self.dispatcher.dispatch(&invocation).await;
            }
            Category::Media(kind) => {
                tracing::debug!(sender = %message.sender, kind = kind.as_str(), "Media message");
                let reply = self.media.handle(&message).await;
                self.reply(&message.conversation_id, &reply).await;
            }
            Category::Text => self.handle_text(&message).await,
        }
    }

    /// Upsert the sender, refresh last-seen, and append to the message log.
    async fn record_sender(&self, message: &IncomingMessage) -> Result<(), Error> {
        self.store
            .upsert_user(&message.sender, message.sender_name.as_deref(), None)
            .await?;
        self.store.touch_last_seen(&message.sender).await?;
        self.store
            .log_message(
                &message.sender,
                &message.conversation_id,
                &message.body,
                message.kind,
                false,
            )
            .await?;
        Ok(())
    }

    /// Plain-text stages, in order: auto-reply rules, then the greeting and
    /// help fallbacks. The stages are independent — a message that matches
    /// a rule and contains a greeting word gets both replies.
    async fn handle_text(&self, message: &IncomingMessage) {
        match self.matcher.match_text(&message.body).await {
            Ok(Some(reply)) => self.reply(&message.conversation_id, &reply).await,
            Ok(None) => {}
            Err(e) => tracing::error!("Auto-reply matching failed: {e}"),
        }

        let lower = message.body.to_lowercase();

        if contains_greeting(&lower) {
            let name = message.sender_name.as_deref().unwrap_or("there");
            let greeting = format!(
                "Hello {name}! 👋\n\n\
                 I'm {}, your automated assistant.\n\
                 Type /help to see what I can do!",
                self.config.name
            );
            self.reply(&message.conversation_id, &greeting).await;
        }

        if asks_for_help(&lower) {
            let help = "🤖 I can help you with:\n\n\
                 • Commands - type /help for the full list\n\
                 • Weather, quotes, jokes, calculations\n\
                 • Media - send me images, documents, audio or video\n\
                 • Scheduled messages and auto-replies (admins)";
            self.reply(&message.conversation_id, help).await;
        }
    }

    /// Send a reply and append it to the message log as a bot message.
    async fn reply(&self, conversation_id: &str, text: &str) {
        if let Err(e) = self.channel.send(conversation_id, text).await {
            tracing::error!(conversation = %conversation_id, "Failed to send reply: {e}");
            return;
        }
        if let Err(e) = self
            .store
            .log_message(&self.config.name, conversation_id, text, ContentKind::Text, true)
            .await
        {
            tracing::warn!("Failed to log reply: {e}");
        }
    }
}

/// Whole-word greeting check, punctuation trimmed per token.
fn contains_greeting(lower: &str) -> bool {
    lower
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .any(|t| matches!(t, "hello" | "hi" | "hey"))
}

fn asks_for_help(lower: &str) -> bool {
    lower.contains("what can you do")
        || lower
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
            .any(|t| t == "help")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_matches_whole_words_only() {
        assert!(contains_greeting("hello there"));
        assert!(contains_greeting("hey!"));
        assert!(contains_greeting("well hi."));
        assert!(!contains_greeting("this is history"));
        assert!(!contains_greeting("highway to nowhere"));
    }

    #[test]
    fn help_phrases() {
        assert!(asks_for_help("what can you do?"));
        assert!(asks_for_help("i need help please"));
        assert!(!asks_for_help("helpless situation"));
    }
}
