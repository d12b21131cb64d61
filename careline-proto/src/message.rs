//! Chat message wire types and the reconciled message identity.
//!
//! On the wire a message carries up to two identity fields: the
//! server-assigned `messageId` and the client-generated `tempMessageId`
//! used for optimistic sends. [`MessageIdentity`] reconciles the pair into
//! one tagged value — confirmed wins whenever it is present — so the
//! de-duplication ledger never has to reason about two optional fields.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::group::{GroupId, Timestamp};

/// The resolved identity of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageIdentity {
    /// Server-assigned identity (`messageId`); authoritative.
    Confirmed(String),
    /// Client-generated provisional identity (`tempMessageId`).
    Optimistic(String),
}

impl MessageIdentity {
    /// Returns the underlying identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Confirmed(id) | Self::Optimistic(id) => id,
        }
    }
}

impl std::fmt::Display for MessageIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of content a message carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// Plain text.
    Text,
    /// An image reference.
    Image,
    /// A system-generated notice.
    System,
    /// Any other type string.
    Other(String),
}

impl MessageType {
    /// Returns the wire string for this message type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::System => "system",
            Self::Other(kind) => kind,
        }
    }

    fn default_text() -> Self {
        Self::Text
    }
}

impl From<String> for MessageType {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "text" => Self::Text,
            "image" => Self::Image,
            "system" => Self::System,
            _ => Self::Other(kind),
        }
    }
}

impl From<MessageType> for String {
    fn from(kind: MessageType) -> Self {
        kind.as_str().to_string()
    }
}

/// A chat message as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    /// Server-assigned identity, absent until the server has seen the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Client-generated provisional identity for optimistic sends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_message_id: Option<String>,
    /// The group this message belongs to.
    pub group_id: GroupId,
    /// The sender's user identity.
    pub sender_id: String,
    /// The message body.
    pub content: String,
    /// Content kind.
    #[serde(default = "MessageType::default_text")]
    pub message_type: MessageType,
    /// When the message was sent.
    #[serde(default)]
    pub send_at: Timestamp,
}

impl WireMessage {
    /// Builds an outgoing message with a fresh provisional identity.
    #[must_use]
    pub fn outgoing(group_id: GroupId, sender_id: impl Into<String>, content: &str) -> Self {
        Self {
            message_id: None,
            temp_message_id: Some(Uuid::now_v7().to_string()),
            group_id,
            sender_id: sender_id.into(),
            content: content.to_string(),
            message_type: MessageType::Text,
            send_at: Timestamp::now(),
        }
    }

    /// Resolves this message's identity: confirmed if present, else
    /// optimistic. `None` only when both fields are absent.
    #[must_use]
    pub fn identity(&self) -> Option<MessageIdentity> {
        if let Some(id) = &self.message_id {
            return Some(MessageIdentity::Confirmed(id.clone()));
        }
        self.temp_message_id
            .as_ref()
            .map(|id| MessageIdentity::Optimistic(id.clone()))
    }

    /// Returns `true` when `other` is the same message by either identity
    /// field. Used as the second line of defense before list insertion.
    #[must_use]
    pub fn is_same_message(&self, other: &Self) -> bool {
        let confirmed = self.message_id.is_some() && self.message_id == other.message_id;
        let optimistic =
            self.temp_message_id.is_some() && self.temp_message_id == other.temp_message_id;
        confirmed || optimistic
    }
}
