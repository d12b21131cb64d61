//! Appointment domain wire types.

use serde::{Deserialize, Serialize};

use crate::group::Timestamp;

/// A scheduled appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    /// Unique appointment identifier.
    pub appointment_id: String,
    /// The booking user.
    pub user_id: String,
    /// The provider the appointment is with, when assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    /// When the appointment takes place.
    pub scheduled_at: Timestamp,
    /// Free-form booking reason.
    #[serde(default)]
    pub reason: String,
}

/// Payload of `schedule_appointment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleAppointmentPayload {
    /// The booking user.
    pub user_id: String,
    /// Requested provider, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    /// Requested time.
    pub scheduled_at: Timestamp,
    /// Free-form booking reason.
    #[serde(default)]
    pub reason: String,
}

/// Payload of the inbound `schedule_appointment_response`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleAppointmentResponse {
    /// Whether the booking succeeded.
    pub success: bool,
    /// Server-provided detail text.
    #[serde(default)]
    pub message: String,
    /// The booked appointment, on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment: Option<Appointment>,
}
