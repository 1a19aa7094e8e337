//! User-facing notifications
//!
//! Fire-and-forget toasts raised by the pipeline. Every notification is also
//! logged; the feed keeps the most recent ones until a client drains it.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// Feed capacity; older entries are dropped first
pub const FEED_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    /// Set when the notification is about one ficha
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ficha_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Shared notification feed
#[derive(Clone)]
pub struct Notifier {
    feed: Arc<Mutex<VecDeque<Notification>>>,
    capacity: usize,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::with_capacity(FEED_CAPACITY)
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            feed: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    pub fn success(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(notification = "success", "{}", message);
        self.push(NotificationLevel::Success, message, None);
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(notification = "info", "{}", message);
        self.push(NotificationLevel::Info, message, None);
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(notification = "error", "{}", message);
        self.push(NotificationLevel::Error, message, None);
    }

    /// Error scoped to one ficha
    pub fn ficha_error(&self, ficha_id: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(notification = "error", ficha_id, "{}", message);
        self.push(NotificationLevel::Error, message, Some(ficha_id.to_string()));
    }

    /// Success scoped to one ficha
    pub fn ficha_success(&self, ficha_id: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(notification = "success", ficha_id, "{}", message);
        self.push(NotificationLevel::Success, message, Some(ficha_id.to_string()));
    }

    /// Take everything in the feed, oldest first
    pub fn drain(&self) -> Vec<Notification> {
        self.feed.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.feed.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.feed.lock().is_empty()
    }

    fn push(&self, level: NotificationLevel, message: String, ficha_id: Option<String>) {
        let mut feed = self.feed.lock();
        while feed.len() >= self.capacity {
            feed.pop_front();
        }
        feed.push_back(Notification {
            level,
            message,
            ficha_id,
            created_at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_returns_in_order_and_empties() {
        let notifier = Notifier::new();
        notifier.info("Processed image pair 1 of 2");
        notifier.ficha_error("ficha-0-1", "OCR failed");

        let drained = notifier.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].level, NotificationLevel::Info);
        assert_eq!(drained[1].ficha_id.as_deref(), Some("ficha-0-1"));
        assert!(notifier.is_empty());
    }

    #[test]
    fn test_feed_is_bounded() {
        let notifier = Notifier::with_capacity(3);
        for i in 0..5 {
            notifier.success(format!("n{}", i));
        }

        let drained = notifier.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0].message, "n2");
    }

    #[test]
    fn test_clones_share_the_feed() {
        let notifier = Notifier::new();
        notifier.clone().error("boom");
        assert_eq!(notifier.len(), 1);
    }
}
