//! Short-lived footer notifications.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// A message shown in the footer until it expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    pub expires_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        message: impl Into<String>,
        level: NotificationLevel,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            message: message.into(),
            level,
            expires_at: now + ttl,
        }
    }

    pub fn info(message: impl Into<String>, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self::new(message, NotificationLevel::Info, now, ttl)
    }

    pub fn error(message: impl Into<String>, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self::new(message, NotificationLevel::Error, now, ttl)
    }

    pub fn is_error(&self) -> bool {
        self.level == NotificationLevel::Error
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
