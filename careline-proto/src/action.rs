//! Action names recognized on the Careline wire.
//!
//! The strings below form the contract with the server and must not be
//! altered. Dispatch on inbound frames happens once, at the envelope
//! boundary, against this closed enum; anything the table does not name
//! decodes to [`Action::Unknown`] rather than an error, so a newer server
//! can never break frame delivery.

use serde::{Deserialize, Serialize};

/// A wire action name, decoded from / encoded to its exact string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    /// Bind the connection to a user identity.
    Authenticate,
    /// Enter a conversation group.
    JoinGroup,
    /// Leave a conversation group.
    LeaveGroup,
    /// Request creation of a conversation group.
    CreateGroup,
    /// Send a chat message into the active group.
    SendMessage,
    /// Request a page of message history.
    GetMessages,
    /// Request the caller's group list.
    GetGroups,
    /// Request deletion of a group.
    DeleteGroup,
    /// Server: a group was created.
    GroupCreated,
    /// Server: a group was deleted.
    GroupDeleted,
    /// Server: a page of message history.
    Messages,
    /// Server: the caller's group list.
    Groups,
    /// Server: a live chat message.
    MessageReceived,
    /// Server: an error report.
    Error,
    /// Request an appointment booking.
    ScheduleAppointment,
    /// Server: outcome of an appointment booking.
    ScheduleAppointmentResponse,
    /// Request creation of a call room.
    CreateRoom,
    /// Server: outcome of a room creation.
    CreateRoomResponse,
    /// Request the rooms scheduled for a date.
    GetRoomsByDate,
    /// Server: rooms scheduled for a date.
    GetRoomsByDateResponse,
    /// Request a room status change.
    UpdateRoomStatus,
    /// Server: outcome of a room status change.
    UpdateRoomStatusResponse,
    /// Any action name outside the table above.
    Unknown(String),
}

impl Action {
    /// Returns the exact wire string for this action.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Authenticate => "authenticate",
            Self::JoinGroup => "join_group",
            Self::LeaveGroup => "leave_group",
            Self::CreateGroup => "create_group",
            Self::SendMessage => "send_message",
            Self::GetMessages => "get_messages",
            Self::GetGroups => "get_groups",
            Self::DeleteGroup => "delete_group",
            Self::GroupCreated => "group_created",
            Self::GroupDeleted => "group_deleted",
            Self::Messages => "messages",
            Self::Groups => "groups",
            Self::MessageReceived => "message_received",
            Self::Error => "error",
            Self::ScheduleAppointment => "schedule_appointment",
            Self::ScheduleAppointmentResponse => "schedule_appointment_response",
            Self::CreateRoom => "create_room",
            Self::CreateRoomResponse => "create_room_response",
            Self::GetRoomsByDate => "get_rooms_by_date",
            Self::GetRoomsByDateResponse => "get_rooms_by_date_response",
            Self::UpdateRoomStatus => "update_room_status",
            Self::UpdateRoomStatusResponse => "update_room_status_response",
            Self::Unknown(name) => name,
        }
    }
}

impl From<&str> for Action {
    fn from(name: &str) -> Self {
        match name {
            "authenticate" => Self::Authenticate,
            "join_group" => Self::JoinGroup,
            "leave_group" => Self::LeaveGroup,
            "create_group" => Self::CreateGroup,
            "send_message" => Self::SendMessage,
            "get_messages" => Self::GetMessages,
            "get_groups" => Self::GetGroups,
            "delete_group" => Self::DeleteGroup,
            "group_created" => Self::GroupCreated,
            "group_deleted" => Self::GroupDeleted,
            "messages" => Self::Messages,
            "groups" => Self::Groups,
            "message_received" => Self::MessageReceived,
            "error" => Self::Error,
            "schedule_appointment" => Self::ScheduleAppointment,
            "schedule_appointment_response" => Self::ScheduleAppointmentResponse,
            "create_room" => Self::CreateRoom,
            "create_room_response" => Self::CreateRoomResponse,
            "get_rooms_by_date" => Self::GetRoomsByDate,
            "get_rooms_by_date_response" => Self::GetRoomsByDateResponse,
            "update_room_status" => Self::UpdateRoomStatus,
            "update_room_status_response" => Self::UpdateRoomStatusResponse,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl From<String> for Action {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_string()
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
