//! Domain-specific error types following panic-free policy.

use crate::{ProcessId, SessionId};
use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Session not found in the session registry
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: SessionId },

    /// No session is bound to this process
    #[error("No session bound to process: {process_id}")]
    UnknownProcess { process_id: ProcessId },

    /// The last remaining session cannot be retired
    #[error("Cannot retire the last remaining session: {session_id}")]
    LastSession { session_id: SessionId },

    /// Invalid field value
    #[error("Invalid {field}: {value} (expected {expected})")]
    InvalidFieldValue {
        field: String,
        value: String,
        expected: String,
    },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
