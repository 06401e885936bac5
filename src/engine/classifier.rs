//! Inbound message classification.
//!
//! Ordering is a fixed contract: a command token pre-empts everything else,
//! typed content comes next, and only plain text reaches the auto-reply and
//! fallback stages.

use crate::channels::{ContentKind, IncomingMessage};

/// What the engine decided an inbound message is.
#[derive(Debug, Clone, PartialEq)]
pub enum Category {
    /// First token starts with `/` or `!`. Token is lower-cased with the
    /// prefix character stripped.
    Command { token: String, args: Vec<String> },
    /// Non-text payload (image, document, audio, video, sticker, location).
    Media(ContentKind),
    /// Plain text — eligible for auto-reply matching and fallbacks.
    Text,
}

pub fn classify(message: &IncomingMessage) -> Category {
    // A command caption pre-empts the payload kind.
    if let Some(command) = parse_command(&message.body) {
        return command;
    }
    if message.kind != ContentKind::Text {
        return Category::Media(message.kind);
    }
    Category::Text
}

/// A command is a first whitespace token beginning with `/` or `!` that has
/// at least one character after the prefix. Everything else is plain text.
fn parse_command(body: &str) -> Option<Category> {
    let mut tokens = body.split_whitespace();
    let first = tokens.next()?;
    let rest = first.strip_prefix(['/', '!'])?;
    if rest.is_empty() {
        return None;
    }

    Some(Category::Command {
        token: rest.to_lowercase(),
        args: tokens.map(str::to_string).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(body: &str) -> IncomingMessage {
        IncomingMessage::text("+100", "conv", body)
    }

    #[test]
    fn slash_and_bang_prefixes_are_commands() {
        for body in ["/help", "!help", "  /help  "] {
            assert_eq!(
                classify(&text(body)),
                Category::Command {
                    token: "help".into(),
                    args: vec![]
                },
                "body {body:?}"
            );
        }
    }

    #[test]
    fn token_is_lowercased_and_args_split() {
        let got = classify(&text("/Weather   New   York"));
        assert_eq!(
            got,
            Category::Command {
                token: "weather".into(),
                args: vec!["New".into(), "York".into()]
            }
        );
    }

    #[test]
    fn bare_prefix_is_plain_text() {
        assert_eq!(classify(&text("/")), Category::Text);
        assert_eq!(classify(&text("!")), Category::Text);
    }

    #[test]
    fn mid_sentence_slash_is_plain_text() {
        assert_eq!(classify(&text("either/or, you decide")), Category::Text);
        assert_eq!(classify(&text("hello /help")), Category::Text);
    }

    #[test]
    fn command_caption_preempts_media_kind() {
        let mut msg = IncomingMessage::media("+100", "conv", ContentKind::Image, None);
        msg.body = "/help".into();
        assert_eq!(
            classify(&msg),
            Category::Command {
                token: "help".into(),
                args: vec![]
            }
        );
    }

    #[test]
    fn media_with_plain_caption_stays_media() {
        let mut msg = IncomingMessage::media("+100", "conv", ContentKind::Image, None);
        msg.body = "holiday photo".into();
        assert_eq!(classify(&msg), Category::Media(ContentKind::Image));
    }

    #[test]
    fn location_classifies_as_media() {
        let msg = IncomingMessage::text("+100", "conv", "").with_location(52.5, 13.4);
        assert_eq!(classify(&msg), Category::Media(ContentKind::Location));
    }
}
