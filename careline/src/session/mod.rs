//! Feature sessions layered on the shared connection.
//!
//! Every feature follows the same router shape: it registers exactly one
//! subscriber with the [`crate::connection::ConnectionManager`] when
//! constructed and releases it when dropped (the [`Subscription`] guard is
//! held by the session, so release happens on every exit path). The
//! subscriber resolves the frame's action against the closed
//! [`careline_proto::action::Action`] table and dispatches to the feature's
//! reducer; unrecognized actions are logged and ignored, never fatal.
//!
//! Reducers run inside the connection's reader loop, synchronously and in
//! frame-arrival order, so every session observes frames exactly as the
//! transport delivered them.
//!
//! [`Subscription`]: crate::connection::Subscription

pub mod appointment;
pub mod chat;
pub mod room;

/// Serializes a typed payload into the envelope `data` value.
///
/// Encoding a payload struct cannot realistically fail; if it ever does the
/// failure is logged and the frame goes out with `null` data rather than
/// surfacing an error through a fire-and-forget path.
pub(crate) fn encode_payload<T: serde::Serialize>(payload: &T) -> serde_json::Value {
    match serde_json::to_value(payload) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode payload");
            serde_json::Value::Null
        }
    }
}
