//! Scripted transport for testing.
//!
//! [`ScriptedDialer`] hands out in-process [`Link`]s backed by channels and
//! records every dial. Each successful dial exposes a [`ScriptedServer`]
//! handle for the far side: tests push inbound frames and close events
//! through it and inspect the frames the client wrote. Dials can be
//! scripted to fail to exercise the reconnection policy.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use careline_proto::action::Action;
use careline_proto::envelope::Envelope;

use super::{Dialer, Link, LinkCommand, LinkEvent, TransportError};

/// In-process dialer whose links are driven by the test.
///
/// Clonable: clones share dial counts and server handles, so a test can
/// keep one while handing another to the connection manager.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDialer {
    state: Arc<DialerState>,
}

#[derive(Debug, Default)]
struct DialerState {
    dials: AtomicU32,
    fail_next: AtomicU32,
    servers: Mutex<Vec<ScriptedServer>>,
}

impl ScriptedDialer {
    /// Creates a dialer with no scripted failures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of dial attempts so far, failed ones included.
    #[must_use]
    pub fn dial_count(&self) -> u32 {
        self.state.dials.load(Ordering::SeqCst)
    }

    /// Scripts the next `count` dials to fail.
    pub fn fail_next_dials(&self, count: u32) {
        self.state.fail_next.store(count, Ordering::SeqCst);
    }

    /// Returns the server handle for the `index`-th successful dial.
    #[must_use]
    pub fn server(&self, index: usize) -> Option<ScriptedServer> {
        self.state.servers.lock().get(index).cloned()
    }

    /// Returns the server handle for the most recent successful dial.
    #[must_use]
    pub fn latest_server(&self) -> Option<ScriptedServer> {
        self.state.servers.lock().last().cloned()
    }
}

impl Dialer for ScriptedDialer {
    async fn dial(&self) -> Result<Link, TransportError> {
        self.state.dials.fetch_add(1, Ordering::SeqCst);

        let failures = self.state.fail_next.load(Ordering::SeqCst);
        if failures > 0 {
            self.state
                .fail_next
                .store(failures.saturating_sub(1), Ordering::SeqCst);
            return Err(TransportError::ConnectFailed(
                "scripted dial failure".to_string(),
            ));
        }

        let (command_tx, mut command_rx) = mpsc::unbounded_channel::<LinkCommand>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<LinkEvent>();

        let server = ScriptedServer {
            events: event_tx.clone(),
            sent: Arc::new(Mutex::new(Vec::new())),
            close_code: Arc::new(Mutex::new(None)),
        };

        let pump_sent = Arc::clone(&server.sent);
        let pump_close = Arc::clone(&server.close_code);
        tokio::spawn(async move {
            while let Some(command) = command_rx.recv().await {
                match command {
                    LinkCommand::Text(text) => pump_sent.lock().push(text),
                    LinkCommand::Close(code) => {
                        *pump_close.lock() = Some(code);
                        // Mirror the close back, like a websocket close
                        // handshake completing.
                        let _ = event_tx.send(LinkEvent::Closed { code });
                        break;
                    }
                }
            }
        });

        self.state.servers.lock().push(server.clone());
        Ok(Link::new(command_tx, event_rx))
    }
}

/// Far-side handle for one scripted link.
#[derive(Debug, Clone)]
pub struct ScriptedServer {
    events: mpsc::UnboundedSender<LinkEvent>,
    sent: Arc<Mutex<Vec<String>>>,
    close_code: Arc<Mutex<Option<u16>>>,
}

impl ScriptedServer {
    /// Delivers a raw text frame to the client.
    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.events.send(LinkEvent::Text(text.into()));
    }

    /// Delivers an encoded `{action, data}` frame to the client.
    pub fn push_envelope(&self, action: Action, data: serde_json::Value) {
        if let Ok(text) = Envelope::new(action, data).encode() {
            self.push_text(text);
        }
    }

    /// Delivers a close event with the given code.
    pub fn push_close(&self, code: u16) {
        let _ = self.events.send(LinkEvent::Closed { code });
    }

    /// All text frames the client has written so far.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Drains and returns the frames the client has written so far.
    #[must_use]
    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Written frames parsed back into envelopes (raw frames skipped).
    #[must_use]
    pub fn sent_envelopes(&self) -> Vec<Envelope> {
        self.sent
            .lock()
            .iter()
            .filter_map(|text| serde_json::from_str(text).ok())
            .collect()
    }

    /// The close code the client closed with, if it has.
    #[must_use]
    pub fn close_code(&self) -> Option<u16> {
        *self.close_code.lock()
    }
}
