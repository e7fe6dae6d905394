//! Conductor Broker - typed publish/subscribe fan-out
//!
//! The broker distributes events from many producers (process reader tasks)
//! to many independent observers (the TUI event loop, loggers, tests).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  publish()   ┌─────────────────────────┐   try_send   ┌──────────────┐
//! │ reader task  │─────────────▶│         Broker          │─────────────▶│ subscriber 1 │
//! └──────────────┘              │  RwLock<HashMap<id,tx>> │─────────────▶│ subscriber 2 │
//! ┌──────────────┐              │                         │─────────────▶│ subscriber N │
//! │ reader task  │─────────────▶│  watcher task per sub   │              └──────────────┘
//! └──────────────┘              └─────────────────────────┘
//! ```
//!
//! Delivery is best-effort and at-most-once: every subscriber owns a bounded
//! buffer, and a subscriber whose buffer is full misses the event instead of
//! stalling the publisher or its peers.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Publishing to or closing an already-closed broker is a no-op
//! - Channel closure on either side is handled gracefully

mod broker;
mod event;

pub use broker::{Broker, BrokerConfig, DEFAULT_BUFFER_SIZE};
pub use event::Event;
