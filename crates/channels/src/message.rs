use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric identity of a person on the messaging platform (end-user or operator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a message posted in the operator group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageHandle(pub i32);

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a per-user sub-channel (forum topic) inside the operator group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicHandle(pub i32);

impl fmt::Display for TopicHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an outgoing message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    /// The private chat with an end-user.
    EndUser(UserId),
    /// The operator group, optionally scoped to a topic.
    Operators { topic: Option<TopicHandle> },
}

impl Destination {
    #[must_use]
    pub fn operators(topic: Option<TopicHandle>) -> Self {
        Self::Operators { topic }
    }
}

/// How the transport should interpret outgoing text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextFormat {
    /// Delivered verbatim.
    #[default]
    Plain,
    /// Telegram-flavoured HTML; callers escape user-supplied fragments.
    Html,
}

/// A message that already exists on the platform and can be copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMessage {
    pub chat_id: i64,
    pub message_id: MessageHandle,
}

/// The external party writing through the private channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndUser {
    pub id: UserId,
    pub display_name: String,
    pub username: Option<String>,
}

impl EndUser {
    /// Public `@handle`, if the user has one.
    #[must_use]
    pub fn handle(&self) -> Option<String> {
        self.username
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(|u| format!("@{u}"))
    }

    /// Display name, falling back to a synthetic one for nameless accounts.
    #[must_use]
    pub fn name_or_fallback(&self) -> String {
        let name = self.display_name.trim();
        if name.is_empty() {
            format!("Client {}", self.id)
        } else {
            name.to_string()
        }
    }
}

/// Kind of a non-text message. Only used for labelling; the payload itself is
/// copied by the transport and never inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Photo,
    Video,
    Animation,
    Audio,
    Voice,
    VideoNote,
    Document,
    Sticker,
    Location,
    Contact,
    Other,
}

impl AttachmentKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Animation => "animation",
            Self::Audio => "audio",
            Self::Voice => "voice",
            Self::VideoNote => "video note",
            Self::Document => "document",
            Self::Sticker => "sticker",
            Self::Location => "location",
            Self::Contact => "contact",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub caption: Option<String>,
}

/// Message payload as far as routing is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Attachment(Attachment),
}

impl Content {
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Attachment(_) => None,
        }
    }

    /// One-line textual rendering, used when the payload must be written
    /// somewhere that cannot hold the original (e.g. a CRM comment).
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Attachment(Attachment { kind, caption }) => match caption.as_deref() {
                Some(caption) if !caption.trim().is_empty() => {
                    format!("[attachment: {}]\n{caption}", kind.as_str())
                },
                _ => format!("[attachment: {}]", kind.as_str()),
            },
        }
    }
}

/// A message an end-user sent to the bot in private.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub from: EndUser,
    pub source: SourceMessage,
    pub content: Content,
}

/// A message posted in the operator group.
#[derive(Debug, Clone)]
pub struct OperatorMessage {
    /// Author, if the platform exposes one (anonymous admins do not).
    pub author: Option<UserId>,
    pub source: SourceMessage,
    /// Topic the message was posted in, `None` for the general area.
    pub topic: Option<TopicHandle>,
    /// The message this one quotes, if any.
    pub reply_to: Option<MessageHandle>,
    pub content: Content,
}

impl OperatorMessage {
    /// Whether the message is a bot command (`/something`).
    #[must_use]
    pub fn is_command(&self) -> bool {
        self.content
            .text()
            .is_some_and(|text| text.trim_start().starts_with('/'))
    }
}
