//! Line protocol spoken on agent stdout/stdin.
//!
//! Agents either print free-form text ([`LineProtocol::Plain`]) or one JSON
//! object per line ([`LineProtocol::Json`]). JSON lines are tagged by their
//! `type` field:
//!
//! ```text
//! {"type":"text","text":"Looking at the parser","delta":false}
//! {"type":"tool_use","name":"Read","summary":"src/lib.rs"}
//! {"type":"usage","metrics":{"input_tokens":1200,"output_tokens":80}}
//! {"type":"phase","phase":"review"}
//! {"type":"ready"}
//! {"type":"working"}
//! {"type":"error","message":"rate limited"}
//! ```
//!
//! Lines that fail to parse are passed through as plain output so a chatty
//! agent never loses text.

use std::fmt;
use std::str::FromStr;

use conductor_core::{MessageKind, ProcessEventKind, ProcessStatus, TokenMetrics};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::commands::SupervisorError;

// ============================================================================
// Line Protocol
// ============================================================================

/// How a child process talks on its standard streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineProtocol {
    /// Every stdout line is a complete text message; stdin gets raw text.
    #[default]
    Plain,
    /// Tagged JSON lines in both directions.
    Json,
}

impl LineProtocol {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Json => "json",
        }
    }

    /// Returns true if the process accepts input as soon as it is launched.
    ///
    /// JSON agents announce readiness with a `ready` line instead.
    pub fn ready_on_spawn(&self) -> bool {
        matches!(self, Self::Plain)
    }

    /// Returns true if the agent reports turn boundaries itself.
    pub fn reports_turns(&self) -> bool {
        matches!(self, Self::Json)
    }

    /// Interprets one stdout line.
    ///
    /// Returns `None` for blank lines.
    pub fn interpret(&self, line: &str) -> Option<ProcessEventKind> {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            return None;
        }

        match self {
            Self::Plain => Some(plain_output(line)),
            Self::Json => match AgentLine::parse(line) {
                Ok(parsed) => Some(parsed.into_event_kind()),
                Err(err) => {
                    trace!(error = %err, "Unparseable agent line, passing through as text");
                    Some(plain_output(line))
                }
            },
        }
    }

    /// Encodes a user message for the child's stdin, without the newline.
    pub fn encode_input(&self, text: &str) -> Result<String, SupervisorError> {
        match self {
            Self::Plain => Ok(text.to_string()),
            Self::Json => serde_json::to_string(&InputLine::User { text }).map_err(SupervisorError::protocol),
        }
    }
}

impl fmt::Display for LineProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LineProtocol {
    type Err = SupervisorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" | "text" => Ok(Self::Plain),
            "json" | "jsonl" => Ok(Self::Json),
            other => Err(SupervisorError::Protocol(format!(
                "unknown line protocol '{other}' (expected plain or json)"
            ))),
        }
    }
}

fn plain_output(line: &str) -> ProcessEventKind {
    ProcessEventKind::Output {
        text: line.to_string(),
        delta: false,
        message_kind: MessageKind::Text,
    }
}

// ============================================================================
// Agent Lines
// ============================================================================

/// One parsed line of JSON agent output.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentLine {
    /// Assistant text; `delta` chunks extend the previous message.
    Text {
        text: String,
        #[serde(default)]
        delta: bool,
    },
    /// The agent invoked a tool.
    ToolUse {
        name: String,
        #[serde(default)]
        summary: Option<String>,
    },
    /// Token/cost snapshot.
    Usage {
        #[serde(default)]
        metrics: Option<TokenMetrics>,
    },
    /// Turn finished; the agent accepts input.
    Ready,
    /// Turn started.
    Working,
    /// Workflow phase changed.
    Phase { phase: String },
    /// Fatal agent-side error.
    Error { message: String },
}

impl AgentLine {
    /// Parses a single JSON line.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }

    /// Converts this line into the event it announces.
    pub fn into_event_kind(self) -> ProcessEventKind {
        match self {
            Self::Text { text, delta } => ProcessEventKind::Output {
                text,
                delta,
                message_kind: MessageKind::Text,
            },
            Self::ToolUse { name, summary } => {
                let text = match summary {
                    Some(summary) if !summary.is_empty() => format!("{name}: {summary}"),
                    _ => name,
                };
                ProcessEventKind::Output {
                    text,
                    delta: false,
                    message_kind: MessageKind::ToolCall,
                }
            }
            Self::Usage { metrics } => ProcessEventKind::TokenUsage { metrics },
            Self::Ready => ProcessEventKind::Ready,
            Self::Working => ProcessEventKind::Working,
            Self::Phase { phase } => ProcessEventKind::PhaseChanged { phase },
            Self::Error { message } => ProcessEventKind::Error {
                status: ProcessStatus::Failed,
                error: message,
            },
        }
    }
}

/// Lines written to a JSON agent's stdin.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputLine<'a> {
    User { text: &'a str },
}
