//! Transport layer abstraction for Careline.
//!
//! Defines the [`Dialer`] trait that produces connected [`Link`]s.
//! Concrete implementations:
//! - [`ws::WsDialer`] — WebSocket client transport (tokio-tungstenite)
//! - [`script::ScriptedDialer`] — in-process scripted transport for testing
//!
//! A link carries newline-free JSON text frames. The transport never
//! inspects frame contents; decoding happens at the connection manager.

pub mod script;
pub mod ws;

use tokio::sync::mpsc;

/// WebSocket close code for a caller-initiated, normal closure.
pub const NORMAL_CLOSURE: u16 = 1000;

/// WebSocket close code for an abnormal termination (no close frame).
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The dial attempt failed.
    #[error("failed to connect: {0}")]
    ConnectFailed(String),

    /// The link to the server has been closed.
    #[error("link closed")]
    LinkClosed,

    /// The endpoint URL is not a usable WebSocket endpoint.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// An underlying I/O error occurred.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Events surfaced by a link to its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A text frame arrived.
    Text(String),
    /// The link closed with the given close code.
    Closed {
        /// WebSocket close code (1000 = normal).
        code: u16,
    },
}

/// Commands a [`LinkSender`] forwards to the transport's writer side.
#[derive(Debug)]
pub enum LinkCommand {
    /// Write a text frame.
    Text(String),
    /// Close the link with the given code.
    Close(u16),
}

/// A connected link: the command side plus the inbound event stream.
///
/// Produced by [`Dialer::dial`]; consumed by the connection manager, which
/// splits it into a clonable sender and the event receiver it reads from.
pub struct Link {
    commands: mpsc::UnboundedSender<LinkCommand>,
    events: mpsc::UnboundedReceiver<LinkEvent>,
}

impl Link {
    /// Assembles a link from its command and event channels.
    #[must_use]
    pub const fn new(
        commands: mpsc::UnboundedSender<LinkCommand>,
        events: mpsc::UnboundedReceiver<LinkEvent>,
    ) -> Self {
        Self { commands, events }
    }

    /// Splits the link into a clonable sender and the event stream.
    #[must_use]
    pub fn split(self) -> (LinkSender, mpsc::UnboundedReceiver<LinkEvent>) {
        (
            LinkSender {
                commands: self.commands,
            },
            self.events,
        )
    }
}

/// Clonable write half of a [`Link`].
#[derive(Debug, Clone)]
pub struct LinkSender {
    commands: mpsc::UnboundedSender<LinkCommand>,
}

impl LinkSender {
    /// Queues a text frame for writing.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::LinkClosed`] if the writer side is gone.
    pub fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.commands
            .send(LinkCommand::Text(text))
            .map_err(|_| TransportError::LinkClosed)
    }

    /// Closes the link with the given close code. Idempotent.
    pub fn close(&self, code: u16) {
        let _ = self.commands.send(LinkCommand::Close(code));
    }
}

/// Async dialer producing connected [`Link`]s.
///
/// A dialer is reused across reconnect attempts; each successful `dial`
/// yields a fresh link.
pub trait Dialer: Send + Sync + 'static {
    /// Establish a new link to the endpoint.
    fn dial(&self) -> impl std::future::Future<Output = Result<Link, TransportError>> + Send;
}
