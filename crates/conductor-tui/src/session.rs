//! One chat session: transcript, process state, and its own pane.

use chrono::{DateTime, Utc};
use conductor_core::{
    ChatMessage, MessageRole, ProcessId, ProcessRole, ProcessStatus, SessionId, TokenMetrics,
};

use crate::config::PaneConfig;
use crate::pane::VirtualPane;

/// An independent transcript bound (eventually) to one agent process.
///
/// `process_id` is empty until a process is spawned for the session. The
/// pane's scroll and selection state belong to this session alone.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub role: ProcessRole,
    pub process_id: ProcessId,
    pub messages: Vec<ChatMessage>,
    pub status: ProcessStatus,
    pub metrics: Option<TokenMetrics>,
    pub queue_count: usize,
    /// Needs re-rendering.
    pub content_dirty: bool,
    /// Has output the user has not seen yet.
    pub has_new_content: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Current workflow phase reported by the agent.
    pub phase: Option<String>,
    pub last_error: Option<String>,
    pub pane: VirtualPane,
}

impl Session {
    pub fn new(id: SessionId, role: ProcessRole, pane: PaneConfig, now: DateTime<Utc>) -> Self {
        let render = pane.render.clone().for_role(role);
        Self {
            id,
            role,
            process_id: ProcessId::default(),
            messages: Vec::new(),
            status: ProcessStatus::Pending,
            metrics: None,
            queue_count: 0,
            content_dirty: false,
            has_new_content: false,
            created_at: now,
            last_activity: now,
            phase: None,
            last_error: None,
            pane: VirtualPane::new(pane.with_render(render)),
        }
    }

    /// Name shown in the session list, e.g. "worker-2".
    pub fn display_name(&self) -> String {
        if self.process_id.is_empty() {
            format!("{} ({})", self.role, self.id)
        } else {
            self.process_id.to_string()
        }
    }

    /// Appends a message to the transcript and the pane.
    pub fn push_message(&mut self, message: ChatMessage) {
        self.pane.append_message(message.clone());
        self.messages.push(message);
    }

    /// Extends the last message with a streaming chunk.
    ///
    /// Starts a new message instead if the last one is not plain text from
    /// `role`, so a delta never lands on a tool-call notice.
    pub fn append_delta(&mut self, role: MessageRole, text: &str, timestamp: DateTime<Utc>) {
        let extends = self
            .messages
            .last()
            .is_some_and(|last| last.accepts_delta_from(role));
        if !extends {
            self.push_message(ChatMessage::text(role, text, timestamp));
            return;
        }
        if let Some(last) = self.messages.last_mut() {
            last.content.push_str(text);
            self.pane.replace_last_message(last.clone());
        }
    }

    /// Seconds since the session last saw an event.
    pub fn idle_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_activity).num_seconds().max(0)
    }
}
