//! Wire protocol library for Careline.
//!
//! Every frame exchanged with the server is a newline-free JSON text frame
//! of the shape `{"action": "<name>", "data": <payload>}`. This crate owns
//! the [`action::Action`] name table, the [`envelope::Envelope`] wrapper,
//! and the typed payloads for the chat, appointment, and room domains.

pub mod action;
pub mod appointment;
pub mod envelope;
pub mod group;
pub mod message;
pub mod payload;
pub mod room;
