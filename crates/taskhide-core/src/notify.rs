//! Outgoing user notifications
//!
//! The core only decides what to say; rendering (log line, tray tooltip) is up
//! to the [`Notifier`] the binary plugs in.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NotificationKind {
    TargetsUpdated,
    TargetStarted,
    TargetExited,
    Refreshed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn targets_updated() -> Self {
        Self::new(NotificationKind::TargetsUpdated, "Processes Editor", "Process list updated")
    }

    pub fn target_started(name: &str) -> Self {
        Self::new(NotificationKind::TargetStarted, "Process Started", name)
    }

    pub fn target_exited(name: &str) -> Self {
        Self::new(NotificationKind::TargetExited, "Process Exited", name)
    }

    pub fn refreshed() -> Self {
        Self::new(NotificationKind::Refreshed, "Refreshed", "Waiting for new process")
    }
}

/// Delivers notifications to the user. Delivery is fire-and-forget.
pub trait Notifier: Send {
    fn notify(&self, notification: &Notification);
}

/// Writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) {
        info!("{}: {}", notification.title, notification.message);
    }
}
