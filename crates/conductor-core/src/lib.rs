//! Conductor Core - Shared types for supervising agent processes
//!
//! This crate provides the domain types shared between the event broker,
//! the process supervisor, and the TUI session router.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod clock;
pub mod error;
pub mod event;
pub mod id;
pub mod message;
pub mod metrics;
pub mod status;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use event::{
    CommandId, CommandLogEvent, CommandType, EventPayload, ProcessEvent, ProcessEventKind,
    ProcessEventType,
};
pub use id::{ProcessId, SessionId};
pub use message::{ChatMessage, MessageKind, MessageRole};
pub use metrics::{Money, TokenCount, TokenMetrics};
pub use status::{ProcessRole, ProcessStatus};
