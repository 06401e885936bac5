//! The `Channel` trait and inbound message types.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Payload kind carried by an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
    Document,
    Audio,
    Video,
    Sticker,
    Location,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Image => "image",
            ContentKind::Document => "document",
            ContentKind::Audio => "audio",
            ContentKind::Video => "video",
            ContentKind::Sticker => "sticker",
            ContentKind::Location => "location",
        }
    }
}

/// An inbound message event from a channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Channel-native sender address.
    pub sender: String,
    /// Display name, if the channel provides one.
    pub sender_name: Option<String>,
    /// Addressable destination for replies.
    pub conversation_id: String,
    /// Body text (caption text for media messages).
    pub body: String,
    pub kind: ContentKind,
    /// Raw media bytes, if the channel downloaded them.
    pub payload: Option<Vec<u8>>,
    /// `(latitude, longitude)`, set when `kind` is `Location`.
    pub location: Option<(f64, f64)>,
    pub timestamp: DateTime<Utc>,
}

impl IncomingMessage {
    /// A plain-text message.
    pub fn text(sender: &str, conversation_id: &str, body: &str) -> Self {
        Self {
            sender: sender.to_string(),
            sender_name: None,
            conversation_id: conversation_id.to_string(),
            body: body.to_string(),
            kind: ContentKind::Text,
            payload: None,
            location: None,
            timestamp: Utc::now(),
        }
    }

    /// A media message with an optional downloaded payload.
    pub fn media(
        sender: &str,
        conversation_id: &str,
        kind: ContentKind,
        payload: Option<Vec<u8>>,
    ) -> Self {
        Self {
            kind,
            payload,
            ..Self::text(sender, conversation_id, "")
        }
    }

    pub fn with_sender_name(mut self, name: &str) -> Self {
        self.sender_name = Some(name.to_string());
        self
    }

    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.kind = ContentKind::Location;
        self.location = Some((latitude, longitude));
        self
    }
}

/// Stream of inbound messages produced by a started channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A messaging transport: emits inbound messages, accepts outbound sends.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel identifier for logs.
    fn name(&self) -> &str;

    /// Start receiving and return the inbound message stream.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Send a plain-text message to a conversation. May fail per-recipient.
    async fn send(&self, conversation_id: &str, text: &str) -> Result<(), ChannelError>;

    /// All conversations known to the channel (broadcast targets).
    async fn list_conversations(&self) -> Result<Vec<String>, ChannelError>;

    /// Release channel resources.
    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
