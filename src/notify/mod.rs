//! User-visible notifications.
//!
//! Every error caught at a subsystem boundary — recognition failures, empty
//! submissions, service errors, workbook decode errors — is converted into a
//! [`Notification`] and handed to a [`NotificationSink`].  Sinks are
//! fire-and-forget: they never return a value and never block the caller.
//!
//! The production sink ([`ChannelSink`]) forwards notifications over an
//! unbounded mpsc channel to the UI, which renders them as transient toasts.

use std::fmt;

use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Visual weight of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Success => write!(f, "success"),
            Severity::Error => write!(f, "error"),
        }
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// A transient message displayed to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notification {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity: Severity::Info,
        }
    }

    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity: Severity::Success,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity: Severity::Error,
        }
    }
}

// ---------------------------------------------------------------------------
// NotificationSink trait
// ---------------------------------------------------------------------------

/// Fire-and-forget consumer of notifications.
///
/// Implementations must be `Send + Sync` so the sink can be shared behind an
/// `Arc<dyn NotificationSink>` between the controller task and tests.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

// ---------------------------------------------------------------------------
// ChannelSink
// ---------------------------------------------------------------------------

/// Forwards notifications over an unbounded channel to the UI thread.
///
/// Send errors (receiver dropped, e.g. the window was closed while a request
/// was in flight) are discarded silently — a late notification has nowhere
/// to go and nothing depends on its delivery.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self { tx }
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        log::debug!(
            "notification [{}] {}: {}",
            notification.severity,
            notification.title,
            notification.description
        );
        let _ = self.tx.send(notification);
    }
}

// ---------------------------------------------------------------------------
// RecordingSink  (test-only)
// ---------------------------------------------------------------------------

/// Test double that records every notification it receives.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingSink {
    notifications: std::sync::Mutex<Vec<Notification>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything notified so far.
    pub fn recorded(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_severity() {
        assert_eq!(Notification::info("a", "b").severity, Severity::Info);
        assert_eq!(Notification::success("a", "b").severity, Severity::Success);
        assert_eq!(Notification::error("a", "b").severity, Severity::Error);
    }

    #[test]
    fn channel_sink_delivers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = ChannelSink::new(tx);

        sink.notify(Notification::info("Voice captured", "Review and submit."));

        let received = rx.try_recv().expect("notification should be queued");
        assert_eq!(received.title, "Voice captured");
        assert_eq!(received.severity, Severity::Info);
    }

    #[test]
    fn channel_sink_ignores_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let sink = ChannelSink::new(tx);

        // Must not panic.
        sink.notify(Notification::error("boom", "receiver is gone"));
    }

    #[test]
    fn recording_sink_captures_in_order() {
        let sink = RecordingSink::new();
        sink.notify(Notification::info("first", ""));
        sink.notify(Notification::error("second", ""));

        let recorded = sink.recorded();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].title, "first");
        assert_eq!(recorded[1].title, "second");
    }
}
