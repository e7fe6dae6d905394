//! Chat transcript messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who a transcript message is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// Output produced by the agent process.
    Agent,
    /// Content delivered into the process (a user turn).
    User,
    /// Notices generated by conductor itself.
    System,
}

/// Structural kind of a message.
///
/// Streaming deltas only ever extend a `Text` message; anything else starts
/// a fresh message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    /// Notice that the agent invoked a tool.
    ToolCall,
}

/// One entry in a session transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub kind: MessageKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Creates a plain-text message.
    pub fn text(role: MessageRole, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            kind: MessageKind::Text,
            content: content.into(),
            timestamp,
        }
    }

    /// Creates a tool-invocation notice from the agent.
    pub fn tool_call(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: MessageRole::Agent,
            kind: MessageKind::ToolCall,
            content: content.into(),
            timestamp,
        }
    }

    /// Returns true if a streaming chunk from `role` may be appended here.
    #[must_use]
    pub fn accepts_delta_from(&self, role: MessageRole) -> bool {
        self.kind == MessageKind::Text && self.role == role
    }
}
