//! Typed payloads for the chat and session actions.
//!
//! All payloads serialize camelCase, matching the server's field naming.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::group::{Group, GroupId};
use crate::message::WireMessage;

/// Payload of `authenticate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatePayload {
    /// The user identity to bind the connection to.
    pub user_id: String,
}

/// Payload of `join_group` and `leave_group`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMembershipPayload {
    /// The target group.
    pub group_id: GroupId,
    /// The acting user, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Payload of `create_group`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupPayload {
    /// Display name for the new group.
    pub group_name: String,
    /// Member identities (may include the AI sentinel).
    pub members: Vec<String>,
    /// The requesting user.
    pub user_id: String,
}

/// Payload of `get_messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMessagesPayload {
    /// The group whose history is requested.
    pub group_id: GroupId,
    /// Zero-based page index.
    pub page: u32,
    /// Page size.
    pub page_size: u32,
}

/// Payload of `get_groups`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetGroupsPayload {
    /// The user whose groups are requested.
    pub user_id: String,
}

/// Payload of `delete_group`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteGroupPayload {
    /// The group to delete.
    pub group_id: GroupId,
    /// The requesting user.
    pub user_id: String,
}

/// Payload of the inbound `messages` history page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesPage {
    /// The group the page belongs to.
    pub group_id: GroupId,
    /// Zero-based page index.
    #[serde(default)]
    pub page: u32,
    /// The page contents, most recent first.
    #[serde(default)]
    pub messages: Vec<WireMessage>,
}

/// Payload of the inbound `groups` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupList {
    /// The caller's groups.
    #[serde(default)]
    pub groups: Vec<Group>,
}

/// Payload of the inbound `group_deleted` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDeleted {
    /// The group that was deleted.
    pub group_id: GroupId,
}

/// Payload of the inbound `error` action.
///
/// Servers send either an object with a `message` field or a bare string;
/// [`ErrorPayload::from_value`] accepts both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    /// The error text.
    pub message: String,
}

impl ErrorPayload {
    /// Extracts the error text from whichever shape the server sent.
    #[must_use]
    pub fn from_value(data: &Value) -> Self {
        let message = match data {
            Value::String(text) => text.clone(),
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| data.to_string(), ToString::to_string),
            _ => data.to_string(),
        };
        Self { message }
    }
}
