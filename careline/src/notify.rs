//! User-facing notification surface.
//!
//! Presentation (toasts, banners) lives outside this layer; sessions talk
//! to it through the [`Notifier`] trait. The default implementation just
//! logs; tests use [`RecordingNotifier`] to assert on what was surfaced.

use std::sync::Arc;

use parking_lot::Mutex;

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// An operation completed.
    Success,
    /// An operation failed.
    Error,
    /// Informational, no action needed.
    Info,
}

impl std::fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// External presentation collaborator for user-facing notifications.
pub trait Notifier: Send + Sync + 'static {
    /// Surface a notification to the user.
    fn notify(&self, kind: NoticeKind, title: &str, detail: &str);
}

/// Default [`Notifier`] that reports through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, kind: NoticeKind, title: &str, detail: &str) {
        match kind {
            NoticeKind::Error => tracing::error!(title, detail, "notification"),
            NoticeKind::Success | NoticeKind::Info => {
                tracing::info!(kind = %kind, title, detail, "notification");
            }
        }
    }
}

/// Test double that records every notification.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    entries: Arc<Mutex<Vec<(NoticeKind, String, String)>>>,
}

impl RecordingNotifier {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything notified so far, in order.
    #[must_use]
    pub fn entries(&self) -> Vec<(NoticeKind, String, String)> {
        self.entries.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, kind: NoticeKind, title: &str, detail: &str) {
        self.entries
            .lock()
            .push((kind, title.to_string(), detail.to_string()));
    }
}
