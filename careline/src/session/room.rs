//! Room feature session.
//!
//! Tracks call-room lifecycle state over the shared connection: creation,
//! discovery by date, and status updates. Terminal outcomes go to the
//! [`Notifier`]; the call media itself is out of scope here.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use careline_proto::action::Action;
use careline_proto::envelope::Inbound;
use careline_proto::room::{
    CreateRoomPayload, CreateRoomResponse, GetRoomsByDatePayload, Room, RoomStatus,
    RoomsByDateResponse, UpdateRoomStatusPayload, UpdateRoomStatusResponse,
};

use crate::connection::{ConnectionManager, Subscription};
use crate::notify::{NoticeKind, Notifier};
use crate::transport::Dialer;

use super::encode_payload;

/// The room feature session.
pub struct RoomSession<D: Dialer, N: Notifier> {
    inner: Arc<RoomInner<D, N>>,
    _subscription: Subscription,
}

struct RoomInner<D: Dialer, N: Notifier> {
    conn: ConnectionManager<D>,
    notifier: N,
    rooms: Mutex<Vec<Room>>,
}

impl<D: Dialer, N: Notifier> RoomSession<D, N> {
    /// Creates a room session on the given connection.
    pub fn new(conn: ConnectionManager<D>, notifier: N) -> Self {
        let inner = Arc::new(RoomInner {
            conn,
            notifier,
            rooms: Mutex::new(Vec::new()),
        });
        let reducer = Arc::clone(&inner);
        let subscription = inner
            .conn
            .subscribe(move |inbound| reducer.reduce(inbound));
        Self {
            inner,
            _subscription: subscription,
        }
    }

    /// Requests creation of a room.
    pub fn create_room(&self, payload: &CreateRoomPayload) {
        self.inner
            .conn
            .send(Action::CreateRoom, encode_payload(payload));
    }

    /// Requests the rooms scheduled for a date (`YYYY-MM-DD`).
    pub fn get_rooms_by_date(&self, date: &str) {
        self.inner.conn.send(
            Action::GetRoomsByDate,
            encode_payload(&GetRoomsByDatePayload {
                date: date.to_string(),
            }),
        );
    }

    /// Requests a room status change.
    pub fn update_room_status(&self, room_id: &str, status: RoomStatus) {
        self.inner.conn.send(
            Action::UpdateRoomStatus,
            encode_payload(&UpdateRoomStatusPayload {
                room_id: room_id.to_string(),
                status,
            }),
        );
    }

    /// Snapshot of the known rooms.
    #[must_use]
    pub fn rooms(&self) -> Vec<Room> {
        self.inner.rooms.lock().clone()
    }
}

impl<D: Dialer, N: Notifier> RoomInner<D, N> {
    fn reduce(&self, inbound: &Inbound) {
        match inbound.action() {
            Action::CreateRoomResponse => self.on_create_response(inbound.data()),
            Action::GetRoomsByDateResponse => self.on_rooms_by_date(inbound.data()),
            Action::UpdateRoomStatusResponse => self.on_status_response(inbound.data()),
            Action::Unknown(name) => {
                tracing::debug!(action = %name, "unrecognized action ignored");
            }
            _ => {}
        }
    }

    fn on_create_response(&self, data: &Value) {
        let response: CreateRoomResponse = match serde_json::from_value(data.clone()) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "malformed create_room_response payload");
                return;
            }
        };

        if response.success {
            if let Some(room) = response.room {
                tracing::info!(room = %room.room_id, "room created");
                self.rooms.lock().push(room);
            }
            self.notifier
                .notify(NoticeKind::Success, "Room created", &response.message);
        } else {
            tracing::warn!(message = %response.message, "room creation failed");
            self.notifier
                .notify(NoticeKind::Error, "Room creation failed", &response.message);
        }
    }

    fn on_rooms_by_date(&self, data: &Value) {
        let response: RoomsByDateResponse = match serde_json::from_value(data.clone()) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "malformed get_rooms_by_date_response payload");
                return;
            }
        };
        tracing::debug!(count = response.rooms.len(), "room list loaded");
        *self.rooms.lock() = response.rooms;
    }

    fn on_status_response(&self, data: &Value) {
        let response: UpdateRoomStatusResponse = match serde_json::from_value(data.clone()) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "malformed update_room_status_response payload");
                return;
            }
        };

        if response.success {
            let mut rooms = self.rooms.lock();
            if let Some(room) = rooms.iter_mut().find(|r| r.room_id == response.room_id) {
                room.status = response.status.clone();
            }
            drop(rooms);
            self.notifier.notify(
                NoticeKind::Success,
                "Room updated",
                &format!("{} is now {}", response.room_id, response.status),
            );
        } else {
            tracing::warn!(room = %response.room_id, message = %response.message, "room status update failed");
            self.notifier
                .notify(NoticeKind::Error, "Room update failed", &response.message);
        }
    }
}
