//! Envelope delivered to subscribers.

use chrono::{DateTime, Utc};
use conductor_core::EventPayload;

/// A published payload, stamped with its kind and publish time.
///
/// The timestamp is taken once when `publish` is called, so every subscriber
/// sees the same instant regardless of when it drains its buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<P: EventPayload> {
    pub kind: P::Kind,
    pub timestamp: DateTime<Utc>,
    pub payload: P,
}

impl<P: EventPayload> Event<P> {
    /// Wraps a payload, deriving its kind.
    pub fn new(payload: P, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: payload.kind(),
            timestamp,
            payload,
        }
    }
}
