//! Appointment feature session.
//!
//! A small instance of the router pattern: one subscriber, one reducer,
//! a list of booked appointments, and terminal outcomes surfaced through
//! the [`Notifier`].

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use careline_proto::action::Action;
use careline_proto::appointment::{Appointment, ScheduleAppointmentPayload};
use careline_proto::envelope::Inbound;

use crate::connection::{ConnectionManager, Subscription};
use crate::notify::{NoticeKind, Notifier};
use crate::transport::Dialer;

use super::encode_payload;

/// The appointment feature session.
pub struct AppointmentSession<D: Dialer, N: Notifier> {
    inner: Arc<AppointmentInner<D, N>>,
    _subscription: Subscription,
}

struct AppointmentInner<D: Dialer, N: Notifier> {
    conn: ConnectionManager<D>,
    notifier: N,
    appointments: Mutex<Vec<Appointment>>,
}

impl<D: Dialer, N: Notifier> AppointmentSession<D, N> {
    /// Creates an appointment session on the given connection.
    pub fn new(conn: ConnectionManager<D>, notifier: N) -> Self {
        let inner = Arc::new(AppointmentInner {
            conn,
            notifier,
            appointments: Mutex::new(Vec::new()),
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

    /// Requests an appointment booking.
    pub fn schedule(&self, payload: &ScheduleAppointmentPayload) {
        self.inner
            .conn
            .send(Action::ScheduleAppointment, encode_payload(payload));
    }

    /// Snapshot of the booked appointments.
    #[must_use]
    pub fn appointments(&self) -> Vec<Appointment> {
        self.inner.appointments.lock().clone()
    }
}

impl<D: Dialer, N: Notifier> AppointmentInner<D, N> {
    fn reduce(&self, inbound: &Inbound) {
        match inbound.action() {
            Action::ScheduleAppointmentResponse => self.on_schedule_response(inbound.data()),
            Action::Unknown(name) => {
                tracing::debug!(action = %name, "unrecognized action ignored");
            }
            _ => {}
        }
    }

    fn on_schedule_response(&self, data: &Value) {
        let response: careline_proto::appointment::ScheduleAppointmentResponse =
            match serde_json::from_value(data.clone()) {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(error = %e, "malformed schedule_appointment_response payload");
                    return;
                }
            };

        if response.success {
            if let Some(appointment) = response.appointment {
                tracing::info!(appointment = %appointment.appointment_id, "appointment booked");
                self.appointments.lock().push(appointment);
            }
            self.notifier
                .notify(NoticeKind::Success, "Appointment scheduled", &response.message);
        } else {
            tracing::warn!(message = %response.message, "appointment booking failed");
            self.notifier
                .notify(NoticeKind::Error, "Appointment failed", &response.message);
        }
    }
}
