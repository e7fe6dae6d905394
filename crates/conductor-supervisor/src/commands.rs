//! Supervisor actor commands, errors, and reply types.
//!
//! This module defines the message types for communicating with the
//! `SupervisorActor`:
//! - `SupervisorCommand`: Commands sent to the actor
//! - `SupervisorError`: Errors that can occur during supervisor operations
//! - `ProcessSpec`, `Delivery`, `ProcessSnapshot`: command inputs and replies
//!
//! Every command that mutates a process carries a [`CommandId`] so its
//! completion can be correlated on the command log.

use std::path::PathBuf;

use conductor_core::{CommandId, ProcessId, ProcessRole, ProcessStatus};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::protocol::LineProtocol;

// ============================================================================
// Process Spec
// ============================================================================

/// What to launch for one agent process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub role: ProcessRole,
    pub program: String,
    pub args: Vec<String>,
    pub protocol: LineProtocol,
    pub working_dir: Option<PathBuf>,
}

impl ProcessSpec {
    /// Creates a spec for `program` with no arguments, speaking plain text.
    pub fn new(role: ProcessRole, program: impl Into<String>) -> Self {
        Self {
            role,
            program: program.into(),
            args: Vec::new(),
            protocol: LineProtocol::default(),
            working_dir: None,
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_protocol(mut self, protocol: LineProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Same program and arguments, different role.
    #[must_use]
    pub fn for_role(&self, role: ProcessRole) -> Self {
        Self {
            role,
            ..self.clone()
        }
    }
}

// ============================================================================
// Replies
// ============================================================================

/// What happened to a message handed to the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Written to the process's stdin.
    Delivered,
    /// Held until the process is ready; `depth` is the new queue length.
    Queued { depth: usize },
    /// Nothing was waiting to be delivered.
    Empty,
}

/// Point-in-time view of one supervised process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSnapshot {
    pub process_id: ProcessId,
    pub role: ProcessRole,
    pub status: ProcessStatus,
    pub queue_len: usize,
    pub pid: Option<u32>,
    pub session_ref: String,
}

// ============================================================================
// Supervisor Commands
// ============================================================================

/// Commands sent to the supervisor actor.
///
/// Mutating commands take an optional oneshot channel for the reply. Callers
/// that only care about the command log pass `None` and never block on the
/// actor.
#[derive(Debug)]
pub enum SupervisorCommand {
    /// Launch a new process under an already allocated id.
    ///
    /// The spec is boxed to reduce enum size variance.
    Spawn {
        command_id: CommandId,
        process_id: ProcessId,
        spec: Box<ProcessSpec>,
        respond_to: Option<oneshot::Sender<Result<ProcessId, SupervisorError>>>,
    },

    /// Deliver a message, or queue it while the process is busy.
    Send {
        command_id: CommandId,
        process_id: ProcessId,
        text: String,
        respond_to: Option<oneshot::Sender<Result<Delivery, SupervisorError>>>,
    },

    /// Deliver the oldest queued message if the process is ready.
    DeliverQueued {
        command_id: CommandId,
        process_id: ProcessId,
        respond_to: Option<oneshot::Sender<Result<Delivery, SupervisorError>>>,
    },

    /// Shut a process down.
    Retire {
        command_id: CommandId,
        process_id: ProcessId,
        respond_to: Option<oneshot::Sender<Result<(), SupervisorError>>>,
    },

    /// Read the current state of one process.
    Inspect {
        process_id: ProcessId,
        respond_to: oneshot::Sender<Option<ProcessSnapshot>>,
    },

    /// Retire every process. Replies with the number of processes signalled.
    Shutdown { respond_to: oneshot::Sender<usize> },
}

// ============================================================================
// Supervisor Errors
// ============================================================================

/// Errors that can occur during supervisor operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupervisorError {
    /// The supervisor has reached its maximum process capacity.
    #[error("supervisor is full (max: {max} processes)")]
    SupervisorFull { max: usize },

    /// No live process has this id.
    #[error("process not found: {0}")]
    ProcessNotFound(ProcessId),

    /// A process with this id is already running.
    #[error("process already exists: {0}")]
    ProcessAlreadyExists(ProcessId),

    /// The child could not be launched.
    #[error("failed to launch '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },

    /// The process is in a state that cannot take input.
    #[error("process {process_id} is {status} and not accepting input")]
    NotAcceptingInput {
        process_id: ProcessId,
        status: ProcessStatus,
    },

    /// Too many messages are already waiting.
    #[error("message queue for {process_id} is full (max: {max})")]
    QueueFull { process_id: ProcessId, max: usize },

    /// The child's stdin is gone.
    #[error("stdin of {0} is closed")]
    StdinClosed(ProcessId),

    /// A line could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The command channel is full.
    #[error("supervisor is busy")]
    Busy,

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

impl SupervisorError {
    /// Creates a protocol error from any error type.
    pub fn protocol<E: std::fmt::Display>(err: E) -> Self {
        Self::Protocol(err.to_string())
    }

    /// Creates a spawn error for `program`.
    pub fn spawn<E: std::fmt::Display>(program: &str, err: E) -> Self {
        Self::SpawnFailed {
            program: program.to_string(),
            reason: err.to_string(),
        }
    }
}
