//! WebSocket transport for Careline.
//!
//! Implements [`Dialer`] over a WebSocket connection to the session server.
//! Each dial establishes one connection and spawns a writer task (owning the
//! sink) and a reader task (mapping frames to [`LinkEvent`]s); the returned
//! [`Link`] is the channel-backed handle over both.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use super::{ABNORMAL_CLOSURE, Dialer, Link, LinkCommand, LinkEvent, TransportError};

/// Default timeout for connecting to the session server.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// WebSocket dialer for a fixed `ws://` or `wss://` endpoint.
#[derive(Debug, Clone)]
pub struct WsDialer {
    /// The session server URL.
    url: String,
    /// Timeout applied to each dial attempt.
    connect_timeout: Duration,
}

impl WsDialer {
    /// Creates a dialer for the given endpoint with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidEndpoint`] if the URL does not parse
    /// or is not a `ws`/`wss` endpoint.
    pub fn new(url: impl Into<String>) -> Result<Self, TransportError> {
        Self::with_timeout(url, CONNECT_TIMEOUT)
    }

    /// Creates a dialer with an explicit connect timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidEndpoint`] if the URL does not parse
    /// or is not a `ws`/`wss` endpoint.
    pub fn with_timeout(
        url: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let url = url.into();
        let parsed =
            url::Url::parse(&url).map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(TransportError::InvalidEndpoint(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }
        Ok(Self {
            url,
            connect_timeout,
        })
    }

    /// Returns the endpoint URL this dialer connects to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Dialer for WsDialer {
    async fn dial(&self) -> Result<Link, TransportError> {
        let (ws_stream, _response) =
            tokio::time::timeout(self.connect_timeout, connect_async(self.url.as_str()))
                .await
                .map_err(|_| {
                    tracing::warn!(url = %self.url, "websocket connect timed out");
                    TransportError::ConnectFailed("connect timed out".to_string())
                })?
                .map_err(|e| {
                    tracing::warn!(url = %self.url, error = %e, "websocket connect failed");
                    TransportError::ConnectFailed(e.to_string())
                })?;

        let (mut sink, mut stream) = ws_stream.split();
        let (command_tx, mut command_rx) = mpsc::unbounded_channel::<LinkCommand>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<LinkEvent>();

        // Writer: owns the sink, drains the command channel.
        tokio::spawn(async move {
            while let Some(command) = command_rx.recv().await {
                match command {
                    LinkCommand::Text(text) => {
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            tracing::warn!(error = %e, "websocket write failed");
                            break;
                        }
                    }
                    LinkCommand::Close(code) => {
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: "".into(),
                        };
                        if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                            tracing::debug!(error = %e, "websocket close write failed");
                        }
                        break;
                    }
                }
            }
        });

        // Reader: maps frames to link events. A stream that ends without a
        // close frame counts as an abnormal closure.
        tokio::spawn(async move {
            let mut close_delivered = false;
            while let Some(result) = stream.next().await {
                match result {
                    Ok(Message::Text(text)) => {
                        if event_tx.send(LinkEvent::Text(text.as_str().to_string())).is_err() {
                            // Consumer dropped — link abandoned.
                            return;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        let code = frame.map_or(ABNORMAL_CLOSURE, |f| u16::from(f.code));
                        let _ = event_tx.send(LinkEvent::Closed { code });
                        close_delivered = true;
                        break;
                    }
                    Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                    Ok(Message::Binary(_)) => {
                        tracing::debug!("ignoring binary frame");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "websocket read error");
                        break;
                    }
                }
            }
            if !close_delivered {
                let _ = event_tx.send(LinkEvent::Closed {
                    code: ABNORMAL_CLOSURE,
                });
            }
        });

        Ok(Link::new(command_tx, event_rx))
    }
}
