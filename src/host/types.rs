//! Shared types exchanged with the host platform.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Identifiers ─────────────────────────────────────────────────────

/// Host-internal chat stream identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(pub String);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Host message identifier, used to forward a message by reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ── Inbound event ───────────────────────────────────────────────────

/// Where an inbound event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginKind {
    Group,
    Private,
}

/// One structural piece of a message as the host represents it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Segment {
    Text(String),
    Image(String),
    Emoji(String),
    /// Compound segment; the host's shape for a forwarded bundle.
    Seglist(Vec<Segment>),
    #[serde(other)]
    Unknown,
}

/// Immutable snapshot of a received message, built by the host per event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub origin: OriginKind,
    /// Group id for group-origin events.
    #[serde(default)]
    pub group_id: Option<String>,
    /// Sender account id.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Plain-text rendering of the message.
    #[serde(default)]
    pub plain_text: String,
    /// `None` when the host supplied no segment structure.
    #[serde(default)]
    pub segments: Option<Vec<Segment>>,
    pub arrived_at: DateTime<Utc>,
    /// Stream the event was received on.
    pub stream_id: StreamId,
    /// Host message id, when the host exposes one on the event.
    #[serde(default)]
    pub message_id: Option<MessageId>,
}

impl InboundEvent {
    /// Group-origin event with the given segments and no text.
    pub fn group(group_id: &str, user_id: &str, stream_id: &str, segments: Vec<Segment>) -> Self {
        Self {
            origin: OriginKind::Group,
            group_id: Some(group_id.to_string()),
            user_id: Some(user_id.to_string()),
            plain_text: String::new(),
            segments: Some(segments),
            arrived_at: Utc::now(),
            stream_id: StreamId(stream_id.to_string()),
            message_id: None,
        }
    }

    /// Private-origin event with the given segments and no text.
    pub fn private(user_id: &str, stream_id: &str, segments: Vec<Segment>) -> Self {
        Self {
            origin: OriginKind::Private,
            group_id: None,
            user_id: Some(user_id.to_string()),
            plain_text: String::new(),
            segments: Some(segments),
            arrived_at: Utc::now(),
            stream_id: StreamId(stream_id.to_string()),
            message_id: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.plain_text = text.into();
        self
    }

    pub fn with_message_id(mut self, id: &str) -> Self {
        self.message_id = Some(MessageId(id.to_string()));
        self
    }

    /// The identifier whitelists are matched against.
    pub fn origin_id(&self) -> Option<&str> {
        match self.origin {
            OriginKind::Group => self.group_id.as_deref(),
            OriginKind::Private => self.user_id.as_deref(),
        }
    }
}

// ── History ─────────────────────────────────────────────────────────

/// A message as returned by the host's history query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: MessageId,
    pub stream_id: StreamId,
    pub sender: String,
    /// Sent by the bot itself.
    #[serde(default)]
    pub from_bot: bool,
    pub timestamp: DateTime<Utc>,
}
