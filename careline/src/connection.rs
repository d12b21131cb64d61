//! Connection manager: the single shared session socket.
//!
//! Owns the socket handle, the connection state machine, the reconnection
//! policy, outbound send, and the fan-out of inbound frames to every
//! registered subscriber. Feature sessions never touch the transport
//! directly — this is the multiplexing seam they all sit behind.
//!
//! The manager is a cheap clonable handle over shared inner state. It is a
//! constructed object with an explicit lifecycle ([`ConnectionManager::connect`] /
//! [`ConnectionManager::disconnect`]), injected into feature sessions rather
//! than reached as ambient global state, so tests can run any number of
//! independent instances.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use careline_proto::action::Action;
use careline_proto::envelope::{Envelope, Inbound, decode};
use careline_proto::payload::AuthenticatePayload;

use crate::transport::{ABNORMAL_CLOSURE, Dialer, LinkEvent, LinkSender, NORMAL_CLOSURE};

/// Attempt-counter sentinel set by [`ConnectionManager::disconnect`]; while
/// present, every reconnect path is suppressed.
const SUPPRESSED: u32 = u32::MAX;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket; nothing scheduled.
    Disconnected,
    /// A dial is in flight.
    Connecting,
    /// The socket is open and usable.
    Connected,
    /// The socket was lost abnormally; a reconnect is pending.
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Reconnection policy knobs.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Base reconnect delay; attempt `n` waits `base_delay * n`.
    ///
    /// Linear, not exponential — a deliberate simplicity choice.
    pub base_delay: Duration,
    /// Maximum number of automatic reconnect attempts.
    pub max_attempts: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_attempts: 5,
        }
    }
}

type SubscriberFn = Arc<dyn Fn(&Inbound) + Send + Sync>;
type SubscriberList = Mutex<Vec<(u64, SubscriberFn)>>;

/// Outcome of delivering one frame to one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberOutcome {
    /// The subscriber's registration id.
    pub subscriber: u64,
    /// `false` when the subscriber panicked and was isolated.
    pub delivered: bool,
}

/// Per-frame fan-out outcome, retrievable via
/// [`ConnectionManager::last_fanout_report`].
///
/// A faulty subscriber never breaks delivery to the others; this report
/// makes the swallow observable instead of log-only.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FanoutReport {
    /// One entry per registered subscriber, in registration order.
    pub outcomes: Vec<SubscriberOutcome>,
}

impl FanoutReport {
    /// Number of subscribers that completed normally.
    #[must_use]
    pub fn delivered_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.delivered).count()
    }

    /// Number of subscribers that panicked and were isolated.
    #[must_use]
    pub fn panicked_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.delivered).count()
    }
}

/// Capability returned by [`ConnectionManager::subscribe`]; dropping it
/// removes the subscriber from the fan-out list, on every exit path.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    list: Weak<SubscriberList>,
}

impl Subscription {
    /// The registration id of this subscriber.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(list) = self.list.upgrade() {
            list.lock().retain(|(id, _)| *id != self.id);
            tracing::debug!(subscriber = self.id, "subscriber removed");
        }
    }
}

/// The shared session connection.
///
/// Clones share one socket, one state machine, and one subscriber set.
pub struct ConnectionManager<D: Dialer> {
    inner: Arc<ConnInner<D>>,
}

impl<D: Dialer> Clone for ConnectionManager<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ConnInner<D> {
    dialer: D,
    config: ConnectionConfig,
    state: Mutex<ConnectionState>,
    /// Reconnect attempts consumed, or [`SUPPRESSED`] after a manual close.
    attempts: AtomicU32,
    /// Session generation; bumped per dial attempt and per manual
    /// disconnect so stale reader tasks cannot touch current state.
    epoch: AtomicU64,
    pending_auth: Mutex<Option<String>>,
    link: Mutex<Option<LinkSender>>,
    subscribers: Arc<SubscriberList>,
    next_subscriber: AtomicU64,
    reconnect_timer: Mutex<Option<JoinHandle<()>>>,
    last_fanout: Mutex<Option<FanoutReport>>,
}

impl<D: Dialer> ConnectionManager<D> {
    /// Creates a manager with the default reconnection policy.
    pub fn new(dialer: D) -> Self {
        Self::with_config(dialer, ConnectionConfig::default())
    }

    /// Creates a manager with an explicit reconnection policy.
    pub fn with_config(dialer: D, config: ConnectionConfig) -> Self {
        Self {
            inner: Arc::new(ConnInner {
                dialer,
                config,
                state: Mutex::new(ConnectionState::Disconnected),
                attempts: AtomicU32::new(0),
                epoch: AtomicU64::new(0),
                pending_auth: Mutex::new(None),
                link: Mutex::new(None),
                subscribers: Arc::new(Mutex::new(Vec::new())),
                next_subscriber: AtomicU64::new(0),
                reconnect_timer: Mutex::new(None),
                last_fanout: Mutex::new(None),
            }),
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// Opens the connection. No-op while Connecting or Connected.
    ///
    /// Must be called from within a tokio runtime; the dial and the reader
    /// loop run on spawned tasks.
    pub fn connect(&self) {
        {
            let mut state = self.inner.state.lock();
            if matches!(
                *state,
                ConnectionState::Connecting | ConnectionState::Connected
            ) {
                tracing::debug!(state = %*state, "connect ignored in current state");
                return;
            }
            *state = ConnectionState::Connecting;
        }
        // A manual connect() clears the suppression left by disconnect().
        let _ = self.inner.attempts.compare_exchange(
            SUPPRESSED,
            0,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            ConnInner::run_connect(inner).await;
        });
    }

    /// Closes the connection with a normal-closure code and suppresses any
    /// further automatic reconnection. Terminal until `connect()` again.
    pub fn disconnect(&self) {
        let inner = &self.inner;
        inner.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(timer) = inner.reconnect_timer.lock().take() {
            timer.abort();
        }
        inner.attempts.store(SUPPRESSED, Ordering::SeqCst);
        let sender = inner.link.lock().take();
        if let Some(sender) = sender {
            sender.close(NORMAL_CLOSURE);
        }
        *inner.state.lock() = ConnectionState::Disconnected;
        tracing::info!("disconnected");
    }

    /// Records `user_id` as the identity to authenticate with.
    ///
    /// If already connected, the authenticate envelope is sent immediately;
    /// otherwise the identity is consumed on the next successful open — and
    /// only that one, later reopens do not resend it.
    pub fn authenticate(&self, user_id: &str) {
        if self.state() == ConnectionState::Connected {
            tracing::debug!(user_id, "authenticating");
            self.inner
                .send_envelope(Action::Authenticate, auth_data(user_id));
        } else {
            tracing::debug!(user_id, "authentication recorded for next open");
            *self.inner.pending_auth.lock() = Some(user_id.to_string());
        }
    }

    /// Sends one `{action, data}` frame. Fire-and-forget: dropped silently
    /// unless Connected, and never surfaces an error to the caller.
    pub fn send(&self, action: Action, data: Value) {
        if self.state() != ConnectionState::Connected {
            tracing::debug!(action = %action, state = %self.state(), "send dropped while not connected");
            return;
        }
        self.inner.send_envelope(action, data);
    }

    /// Registers a subscriber into the fan-out set.
    ///
    /// Every inbound frame is delivered to every registered subscriber,
    /// synchronously, in registration order. The returned [`Subscription`]
    /// removes the entry when dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Inbound) + Send + Sync + 'static,
    {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::SeqCst);
        self.inner.subscribers.lock().push((id, Arc::new(callback)));
        tracing::debug!(subscriber = id, "subscriber registered");
        Subscription {
            id,
            list: Arc::downgrade(&self.inner.subscribers),
        }
    }

    /// The fan-out outcome of the most recently delivered frame.
    #[must_use]
    pub fn last_fanout_report(&self) -> Option<FanoutReport> {
        self.inner.last_fanout.lock().clone()
    }
}

impl<D: Dialer> ConnInner<D> {
    async fn run_connect(inner: Arc<Self>) {
        let epoch = inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        match inner.dialer.dial().await {
            Ok(link) => {
                let (sender, events) = link.split();
                *inner.link.lock() = Some(sender.clone());
                {
                    let mut state = inner.state.lock();
                    if inner.epoch.load(Ordering::SeqCst) != epoch {
                        // Superseded by disconnect() while dialing.
                        drop(state);
                        inner.link.lock().take();
                        sender.close(NORMAL_CLOSURE);
                        return;
                    }
                    *state = ConnectionState::Connected;
                }
                inner.attempts.store(0, Ordering::SeqCst);
                tracing::info!("connection established");

                // Pending intent: an identity requested before the socket
                // existed is honored the moment it becomes usable.
                let pending = inner.pending_auth.lock().take();
                if let Some(user_id) = pending {
                    tracing::debug!(user_id = %user_id, "sending pending authentication");
                    inner.send_envelope(Action::Authenticate, auth_data(&user_id));
                }

                Self::read_loop(&inner, events, epoch).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "dial failed");
                Self::handle_closed(&inner, ABNORMAL_CLOSURE, epoch);
            }
        }
    }

    /// Drives one link session: frames fan out in arrival order, a close
    /// event (or the stream ending without one) enters the close path.
    async fn read_loop(
        inner: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<LinkEvent>,
        epoch: u64,
    ) {
        while let Some(event) = events.recv().await {
            if inner.epoch.load(Ordering::SeqCst) != epoch {
                // A newer session owns the state now.
                return;
            }
            match event {
                LinkEvent::Text(text) => {
                    let inbound = decode(&text);
                    if matches!(inbound, Inbound::Raw(_)) {
                        tracing::debug!("frame did not parse as an envelope, passing through raw");
                    }
                    inner.fan_out(&inbound);
                }
                LinkEvent::Closed { code } => {
                    Self::handle_closed(inner, code, epoch);
                    return;
                }
            }
        }
        Self::handle_closed(inner, ABNORMAL_CLOSURE, epoch);
    }

    fn handle_closed(inner: &Arc<Self>, code: u16, epoch: u64) {
        if inner.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }
        inner.link.lock().take();

        if code == NORMAL_CLOSURE {
            *inner.state.lock() = ConnectionState::Disconnected;
            tracing::info!("connection closed normally");
            return;
        }

        let attempts = inner.attempts.load(Ordering::SeqCst);
        if attempts == SUPPRESSED {
            *inner.state.lock() = ConnectionState::Disconnected;
            return;
        }
        if attempts >= inner.config.max_attempts {
            *inner.state.lock() = ConnectionState::Disconnected;
            tracing::warn!(attempts, "reconnect attempts exhausted, staying disconnected");
            return;
        }

        let attempt = attempts + 1;
        inner.attempts.store(attempt, Ordering::SeqCst);
        *inner.state.lock() = ConnectionState::Error;
        // Linear backoff, kept deliberately (attempt * base, not 2^n).
        let delay = inner.config.base_delay * attempt;
        tracing::info!(code, attempt, ?delay, "connection lost, scheduling reconnect");

        let timer_inner = Arc::clone(inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if timer_inner.attempts.load(Ordering::SeqCst) == SUPPRESSED {
                return;
            }
            {
                let mut state = timer_inner.state.lock();
                if *state != ConnectionState::Error {
                    return;
                }
                *state = ConnectionState::Connecting;
            }
            ConnInner::run_connect(timer_inner).await;
        });
        *inner.reconnect_timer.lock() = Some(handle);
    }

    fn fan_out(&self, inbound: &Inbound) -> FanoutReport {
        let subscribers: Vec<(u64, SubscriberFn)> = self
            .subscribers
            .lock()
            .iter()
            .map(|(id, callback)| (*id, Arc::clone(callback)))
            .collect();

        let mut outcomes = Vec::with_capacity(subscribers.len());
        for (subscriber, callback) in subscribers {
            let delivered =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(inbound)))
                    .is_ok();
            if !delivered {
                tracing::error!(subscriber, "subscriber panicked during fan-out");
            }
            outcomes.push(SubscriberOutcome {
                subscriber,
                delivered,
            });
        }

        let report = FanoutReport { outcomes };
        *self.last_fanout.lock() = Some(report.clone());
        report
    }

    fn send_envelope(&self, action: Action, data: Value) {
        let envelope = Envelope::new(action, data);
        let text = match envelope.encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(action = %envelope.action, error = %e, "failed to encode envelope");
                return;
            }
        };
        let sender = self.link.lock().clone();
        match sender {
            Some(sender) => {
                if let Err(e) = sender.send_text(text) {
                    tracing::warn!(action = %envelope.action, error = %e, "link write failed");
                }
            }
            None => tracing::debug!(action = %envelope.action, "no active link, frame dropped"),
        }
    }
}

/// Builds the `authenticate` payload.
fn auth_data(user_id: &str) -> Value {
    serde_json::to_value(AuthenticatePayload {
        user_id: user_id.to_string(),
    })
    .unwrap_or(Value::Null)
}
