//! User-visible notices.
//!
//! The containers never surface failures as errors to rendering code; they
//! publish a [`Notice`] instead and whoever draws the UI (the CLI here)
//! subscribes to the stream.

use serde::Serialize;
use tokio::sync::broadcast;

/// Buffered notices per subscriber before the oldest are dropped.
const NOTICE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// A message meant for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Fan-out publisher shared by the session and workspace containers.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTICE_CAPACITY);
        Self { tx }
    }

    /// Publish a notice. Having no subscribers is not an error.
    pub fn publish(&self, notice: Notice) {
        tracing::debug!(level = ?notice.level, message = %notice.message, "Notice");
        let _ = self.tx.send(notice);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
