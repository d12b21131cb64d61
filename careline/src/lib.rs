//! Careline — realtime messaging session client library.
//!
//! One shared WebSocket connection multiplexes several independent feature
//! streams (AI chat, peer chat, appointment events, room lifecycle events).
//! The [`connection::ConnectionManager`] owns the socket, its state machine,
//! and the subscriber fan-out; feature sessions under [`session`] layer
//! action-keyed reducers on top of it.

pub mod assistant;
pub mod config;
pub mod connection;
pub mod notify;
pub mod session;
pub mod store;
pub mod transport;
