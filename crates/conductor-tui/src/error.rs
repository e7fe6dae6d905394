//! Error types for the conductor TUI.
//!
//! This module defines errors that can occur during terminal
//! initialization, session routing, and supervisor interaction.
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::io;

use conductor_core::{DomainError, SessionId};
use conductor_supervisor::SupervisorError;
use thiserror::Error;

use crate::clipboard::ClipboardError;

// ============================================================================
// TUI Error Type
// ============================================================================

/// TUI application errors.
///
/// None of these are fatal to a running session list: the app turns them
/// into a notification and leaves session state as it was.
#[derive(Error, Debug)]
pub enum TuiError {
    /// Failed to initialize the terminal.
    ///
    /// This occurs when the TUI cannot set up raw mode, alternate screen,
    /// or mouse capture. Common causes include running in a non-TTY
    /// environment (pipes, scripts).
    #[error("Failed to initialize terminal: {0}")]
    TerminalInit(String),

    /// Failed to cleanup/restore the terminal.
    ///
    /// The terminal may be left in an inconsistent state; running `reset`
    /// can help recover.
    #[error("Failed to restore terminal: {0}")]
    TerminalCleanup(String),

    /// No process supervisor is attached to the router.
    #[error("No process supervisor attached")]
    NoSupervisor,

    /// The session has no process to talk to yet.
    #[error("Session {session_id} has no running process")]
    NoProcess { session_id: SessionId },

    /// Session registry error.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The supervisor rejected a command.
    #[error("Supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),

    /// Clipboard copy failed.
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),

    /// I/O error passthrough.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Convenience Result type alias for TUI operations.
pub type Result<T> = std::result::Result<T, TuiError>;
