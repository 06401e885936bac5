//! Typed-content handling — persist inbound media and acknowledge it.

use std::path::PathBuf;

use chrono::Utc;
use tokio::fs;

use crate::channels::{ContentKind, IncomingMessage};

/// Saves inbound payloads under a per-kind subdirectory of the uploads root
/// and produces the acknowledgment reply for each content kind.
pub struct MediaHandler {
    uploads_dir: PathBuf,
}

impl MediaHandler {
    pub fn new(uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
        }
    }

    /// Subdirectory a payload of this kind lands in. Stickers and locations
    /// carry no payload to store.
    pub fn subdir(kind: ContentKind) -> Option<&'static str> {
        match kind {
            ContentKind::Image => Some("images"),
            ContentKind::Document => Some("documents"),
            ContentKind::Audio => Some("audio"),
            ContentKind::Video => Some("videos"),
            ContentKind::Text | ContentKind::Sticker | ContentKind::Location => None,
        }
    }

    /// Handle a media message: save the payload (if any), return the reply.
    pub async fn handle(&self, message: &IncomingMessage) -> String {
        match message.kind {
            ContentKind::Sticker => "😄 Nice sticker!".to_string(),
            ContentKind::Location => {
                let Some((latitude, longitude)) = message.location else {
                    return "❌ Sorry, I couldn't process your location.".to_string();
                };
                format!("📍 Location received: {latitude}, {longitude}")
            }
            kind => match self.save(message).await {
                Ok(_) => match kind {
                    ContentKind::Image => "📸 Image received and saved!".to_string(),
                    ContentKind::Document => "📄 Document received and saved!".to_string(),
                    ContentKind::Audio => "🎵 Audio received and saved!".to_string(),
                    ContentKind::Video => "🎥 Video received and saved!".to_string(),
                    _ => unreachable!("text never reaches the media handler"),
                },
                Err(e) => {
                    tracing::error!(kind = kind.as_str(), "Failed to save media: {e}");
                    format!("❌ Sorry, I couldn't process your {}.", kind.as_str())
                }
            },
        }
    }

    /// Write the payload to `<uploads>/<subdir>/<kind>_<millis>.bin` and
    /// return the path. Creates the subdirectory on first use.
    async fn save(&self, message: &IncomingMessage) -> std::io::Result<PathBuf> {
        let payload = message.payload.as_deref().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "no payload to save")
        })?;
        let subdir = Self::subdir(message.kind).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "kind has no storage dir")
        })?;

        let dir = self.uploads_dir.join(subdir);
        fs::create_dir_all(&dir).await?;

        let filename = format!(
            "{}_{}.bin",
            message.kind.as_str(),
            Utc::now().timestamp_millis()
        );
        let path = dir.join(filename);
        fs::write(&path, payload).await?;

        tracing::info!(path = %path.display(), "Saved inbound media");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn image_payload_is_saved_and_acked() {
        let dir = tempfile::tempdir().unwrap();
        let handler = MediaHandler::new(dir.path());

        let msg =
            IncomingMessage::media("+100", "conv", ContentKind::Image, Some(vec![1, 2, 3]));
        let reply = handler.handle(&msg).await;

        assert_eq!(reply, "📸 Image received and saved!");
        let mut entries = tokio::fs::read_dir(dir.path().join("images")).await.unwrap();
        let entry = entries.next_entry().await.unwrap().unwrap();
        assert_eq!(tokio::fs::read(entry.path()).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn missing_payload_is_a_processing_failure() {
        let dir = tempfile::tempdir().unwrap();
        let handler = MediaHandler::new(dir.path());

        let msg = IncomingMessage::media("+100", "conv", ContentKind::Video, None);
        assert_eq!(
            handler.handle(&msg).await,
            "❌ Sorry, I couldn't process your video."
        );
    }

    #[tokio::test]
    async fn sticker_and_location_need_no_storage() {
        let dir = tempfile::tempdir().unwrap();
        let handler = MediaHandler::new(dir.path());

        let sticker = IncomingMessage::media("+100", "conv", ContentKind::Sticker, None);
        assert_eq!(handler.handle(&sticker).await, "😄 Nice sticker!");

        let location = IncomingMessage::text("+100", "conv", "").with_location(52.5, 13.4);
        assert_eq!(
            handler.handle(&location).await,
            "📍 Location received: 52.5, 13.4"
        );
    }
}
