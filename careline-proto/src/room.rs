//! Call-room domain wire types.
//!
//! Rooms are containers for scheduled calls; the call media itself is
//! handled elsewhere. This layer only tracks lifecycle state.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RoomStatus {
    /// Created, not yet started.
    Scheduled,
    /// Call in progress.
    Active,
    /// Call finished.
    Ended,
    /// Cancelled before starting.
    Cancelled,
    /// Any other status string.
    Other(String),
}

impl RoomStatus {
    /// Returns the wire string for this status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Active => "active",
            Self::Ended => "ended",
            Self::Cancelled => "cancelled",
            Self::Other(status) => status,
        }
    }
}

impl From<String> for RoomStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "scheduled" => Self::Scheduled,
            "active" => Self::Active,
            "ended" => Self::Ended,
            "cancelled" => Self::Cancelled,
            _ => Self::Other(status),
        }
    }
}

impl From<RoomStatus> for String {
    fn from(status: RoomStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A call room as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Unique room identifier.
    pub room_id: String,
    /// Human-readable room name.
    pub room_name: String,
    /// The date the room is scheduled for (`YYYY-MM-DD`).
    pub scheduled_date: String,
    /// The hosting user.
    pub host_id: String,
    /// Current lifecycle state.
    pub status: RoomStatus,
}

/// Payload of `create_room`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomPayload {
    /// Display name for the new room.
    pub room_name: String,
    /// The date the room is scheduled for (`YYYY-MM-DD`).
    pub scheduled_date: String,
    /// The hosting user.
    pub host_id: String,
}

/// Payload of the inbound `create_room_response`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    /// Whether the creation succeeded.
    pub success: bool,
    /// Server-provided detail text.
    #[serde(default)]
    pub message: String,
    /// The created room, on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<Room>,
}

/// Payload of `get_rooms_by_date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRoomsByDatePayload {
    /// The date to list rooms for (`YYYY-MM-DD`).
    pub date: String,
}

/// Payload of the inbound `get_rooms_by_date_response`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomsByDateResponse {
    /// Rooms scheduled for the requested date.
    #[serde(default)]
    pub rooms: Vec<Room>,
}

/// Payload of `update_room_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoomStatusPayload {
    /// The room to update.
    pub room_id: String,
    /// The requested status.
    pub status: RoomStatus,
}

/// Payload of the inbound `update_room_status_response`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoomStatusResponse {
    /// Whether the update succeeded.
    pub success: bool,
    /// The room that was updated.
    pub room_id: String,
    /// The room's status after the update.
    pub status: RoomStatus,
    /// Server-provided detail text.
    #[serde(default)]
    pub message: String,
}
