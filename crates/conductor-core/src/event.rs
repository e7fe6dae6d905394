//! Events flowing from agent processes to observers.
//!
//! Process events are a closed tagged union: each [`ProcessEventKind`]
//! variant carries exactly the fields that kind needs, so combinations such
//! as metrics on an output event cannot be represented.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{MessageKind, ProcessId, ProcessRole, ProcessStatus, TokenMetrics};

// ============================================================================
// Payload Trait
// ============================================================================

/// A value that can travel through the event broker.
///
/// The broker stamps every delivered envelope with `kind()` so subscribers
/// can filter without matching on the full payload.
pub trait EventPayload: Clone + Send + Sync + 'static {
    /// Discriminant type for this payload.
    type Kind: Copy + fmt::Debug + PartialEq + Eq + Send + Sync + 'static;

    /// Returns the discriminant of this payload.
    fn kind(&self) -> Self::Kind;
}

// ============================================================================
// Process Events
// ============================================================================

/// Discriminant of a [`ProcessEventKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessEventType {
    Spawned,
    Ready,
    Working,
    Output,
    Incoming,
    StatusChange,
    PhaseChanged,
    TokenUsage,
    QueueChanged,
    Error,
}

/// What happened to a process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessEventKind {
    /// The process was launched. Observability only.
    Spawned,
    /// The process is idle and accepts input.
    Ready,
    /// The process started a turn.
    Working,
    /// The process produced output.
    Output {
        text: String,
        /// Append to the previous message instead of starting a new one.
        delta: bool,
        message_kind: MessageKind,
    },
    /// Content was delivered into the process.
    Incoming { text: String },
    /// Direct status assignment.
    StatusChange { status: ProcessStatus },
    /// The process entered a new workflow phase.
    PhaseChanged { phase: String },
    /// Updated token/cost snapshot.
    TokenUsage { metrics: Option<TokenMetrics> },
    /// Number of messages waiting for delivery changed.
    QueueChanged { count: usize },
    /// The process failed.
    Error { status: ProcessStatus, error: String },
}

impl ProcessEventKind {
    /// Returns the discriminant of this kind.
    pub fn event_type(&self) -> ProcessEventType {
        match self {
            Self::Spawned => ProcessEventType::Spawned,
            Self::Ready => ProcessEventType::Ready,
            Self::Working => ProcessEventType::Working,
            Self::Output { .. } => ProcessEventType::Output,
            Self::Incoming { .. } => ProcessEventType::Incoming,
            Self::StatusChange { .. } => ProcessEventType::StatusChange,
            Self::PhaseChanged { .. } => ProcessEventType::PhaseChanged,
            Self::TokenUsage { .. } => ProcessEventType::TokenUsage,
            Self::QueueChanged { .. } => ProcessEventType::QueueChanged,
            Self::Error { .. } => ProcessEventType::Error,
        }
    }
}

/// An event about one agent process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessEvent {
    pub process_id: ProcessId,
    pub role: ProcessRole,
    #[serde(flatten)]
    pub kind: ProcessEventKind,
}

impl ProcessEvent {
    /// Creates an event.
    pub fn new(process_id: impl Into<ProcessId>, role: ProcessRole, kind: ProcessEventKind) -> Self {
        Self {
            process_id: process_id.into(),
            role,
            kind,
        }
    }

    /// Creates a complete (non-delta) text output event.
    pub fn output(process_id: impl Into<ProcessId>, role: ProcessRole, text: impl Into<String>) -> Self {
        Self::new(
            process_id,
            role,
            ProcessEventKind::Output {
                text: text.into(),
                delta: false,
                message_kind: MessageKind::Text,
            },
        )
    }

    /// Creates a streaming text chunk event.
    pub fn delta(process_id: impl Into<ProcessId>, role: ProcessRole, text: impl Into<String>) -> Self {
        Self::new(
            process_id,
            role,
            ProcessEventKind::Output {
                text: text.into(),
                delta: true,
                message_kind: MessageKind::Text,
            },
        )
    }

    /// Creates a tool-invocation notice event.
    pub fn tool_call(process_id: impl Into<ProcessId>, role: ProcessRole, text: impl Into<String>) -> Self {
        Self::new(
            process_id,
            role,
            ProcessEventKind::Output {
                text: text.into(),
                delta: false,
                message_kind: MessageKind::ToolCall,
            },
        )
    }

    /// Creates a status assignment event.
    pub fn status(process_id: impl Into<ProcessId>, role: ProcessRole, status: ProcessStatus) -> Self {
        Self::new(process_id, role, ProcessEventKind::StatusChange { status })
    }
}

impl EventPayload for ProcessEvent {
    type Kind = ProcessEventType;

    fn kind(&self) -> ProcessEventType {
        self.kind.event_type()
    }
}

// ============================================================================
// Command Log Events
// ============================================================================

/// Identifier of one command submitted to the process supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(u64);

impl CommandId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd-{}", self.0)
    }
}

/// Which supervisor command a log entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    Spawn,
    Send,
    DeliverQueued,
    Retire,
}

impl CommandType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Spawn => "spawn",
            Self::Send => "send",
            Self::DeliverQueued => "deliver",
            Self::Retire => "retire",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Completion record of a supervisor command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLogEvent {
    pub command_id: CommandId,
    pub command_type: CommandType,
    pub process_id: Option<ProcessId>,
    pub success: bool,
    pub error: Option<String>,
}

impl CommandLogEvent {
    /// Creates a success record.
    pub fn succeeded(command_id: CommandId, command_type: CommandType, process_id: Option<ProcessId>) -> Self {
        Self {
            command_id,
            command_type,
            process_id,
            success: true,
            error: None,
        }
    }

    /// Creates a failure record.
    pub fn failed(
        command_id: CommandId,
        command_type: CommandType,
        process_id: Option<ProcessId>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            command_id,
            command_type,
            process_id,
            success: false,
            error: Some(error.into()),
        }
    }
}

impl EventPayload for CommandLogEvent {
    type Kind = CommandType;

    fn kind(&self) -> CommandType {
        self.command_type
    }
}
