//! Conversation group wire types.
//!
//! A group is a conversation container. The member list distinguishes the
//! two subtypes: a group whose members include the sentinel [`AI_MEMBER`]
//! identity is an AI group (one human paired with an automated counterpart);
//! anything else is a peer group.

use serde::{Deserialize, Serialize};

/// Sentinel member identity marking a group as an AI conversation.
pub const AI_MEMBER: &str = "AI";

/// Unique identifier for a conversation group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(String);

impl GroupId {
    /// Creates a group identifier from its string representation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string representation of this group ID.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` when the identifier is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Millisecond-precision UTC timestamp.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp for the current instant.
    #[must_use]
    pub fn now() -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(u64::try_from(millis).unwrap_or(u64::MAX))
    }

    /// Creates a timestamp from milliseconds since the UNIX epoch.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as milliseconds since the UNIX epoch.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// A conversation group as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Unique group identifier.
    pub group_id: GroupId,
    /// Human-readable group name.
    pub group_name: String,
    /// Member identities, possibly including [`AI_MEMBER`].
    #[serde(default)]
    pub members: Vec<String>,
    /// When the group was created.
    #[serde(default)]
    pub created_at: Timestamp,
    /// When the group last changed.
    #[serde(default)]
    pub updated_at: Timestamp,
}

impl Group {
    /// Returns `true` when the member list contains the AI sentinel.
    #[must_use]
    pub fn is_ai_group(&self) -> bool {
        self.members.iter().any(|member| member == AI_MEMBER)
    }
}
