//! The `{action, data}` envelope wrapping every wire frame.
//!
//! Decoding is deliberately tolerant: a frame that does not parse as an
//! envelope is passed through as [`Inbound::Raw`] rather than dropped, so
//! subscribers still see it and a legacy encoding (the bare action name as
//! the whole payload) keeps working.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::Action;

/// Placeholder data for frames that carry none.
static NULL_DATA: Value = Value::Null;

/// Error produced when an outbound envelope cannot be serialized.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON serialization failed.
    #[error("envelope encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One wire frame: an action name plus its action-specific payload.
///
/// Constructed per send/receive and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// The action name.
    pub action: Action,
    /// The action-specific payload (`null` when absent on the wire).
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Creates an envelope from an action and its payload.
    #[must_use]
    pub const fn new(action: Action, data: Value) -> Self {
        Self { action, data }
    }

    /// Serializes this envelope to its JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if JSON serialization fails.
    pub fn encode(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// An inbound frame after best-effort decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A well-formed envelope.
    Envelope(Envelope),
    /// A frame that did not parse as an envelope, passed through unchanged.
    Raw(String),
}

impl Inbound {
    /// Resolves the action this frame carries.
    ///
    /// For raw frames the whole payload is treated as the action name
    /// (trimmed, surrounding quotes stripped) — the legacy encoding.
    #[must_use]
    pub fn action(&self) -> Action {
        match self {
            Self::Envelope(envelope) => envelope.action.clone(),
            Self::Raw(text) => Action::from(text.trim().trim_matches('"')),
        }
    }

    /// Returns the frame payload, or `null` for raw frames.
    #[must_use]
    pub fn data(&self) -> &Value {
        match self {
            Self::Envelope(envelope) => &envelope.data,
            Self::Raw(_) => &NULL_DATA,
        }
    }
}

/// Decodes a text frame, falling back to raw passthrough on parse failure.
#[must_use]
pub fn decode(text: &str) -> Inbound {
    match serde_json::from_str::<Envelope>(text) {
        Ok(envelope) => Inbound::Envelope(envelope),
        Err(_) => Inbound::Raw(text.to_string()),
    }
}
