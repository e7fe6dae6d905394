//! Session router and per-session process state machine.
//!
//! The router owns every [`Session`] and resolves each process event to
//! exactly one of them through a reverse `ProcessId -> SessionId` map.
//! An event is applied only to the session its process id resolves to;
//! events with no mapping are logged and dropped.
//!
//! # State machine
//!
//! ```text
//! Pending -> Starting -> Ready <-> Working <-> Paused/Stopped
//!                          \          |
//!                           `----> Retiring -> Retired | Failed
//! ```
//!
//! Status arrives on `Ready`, `Working`, `StatusChange`, and `Error`
//! events. `Spawned` is observability only.
//!
//! # Stale mappings
//!
//! Binding a session to a new process keeps the old process id mapped to the
//! same session, so output still in flight from the previous process lands
//! where it belongs. Session ids are never reused, so a stale entry can
//! never point at a different session. Entries are removed when the session
//! is retired.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

use std::collections::HashMap;

use conductor_broker::Event;
use conductor_core::{
    ChatMessage, CommandId, CommandLogEvent, DomainError, DomainResult, MessageKind, MessageRole,
    Money, ProcessEvent, ProcessEventKind, ProcessId, ProcessRole, ProcessStatus, SessionId,
    SharedClock,
};
use conductor_supervisor::{ProcessSpec, SupervisorHandle};
use ratatui::layout::Rect;
use tracing::{debug, info, warn};

use crate::config::PaneConfig;
use crate::error::{Result, TuiError};
use crate::session::Session;

/// What `handle_event` did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// No session is bound to the event's process id.
    Unrouted,
    /// The owning session was updated.
    Routed(SessionId),
    /// The owning session was updated and the user should see `message`.
    Alert { session_id: SessionId, message: String },
}

impl RouteOutcome {
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::Unrouted => None,
            Self::Routed(id) | Self::Alert { session_id: id, .. } => Some(id),
        }
    }

    pub fn alert(&self) -> Option<&str> {
        match self {
            Self::Alert { message, .. } => Some(message),
            _ => None,
        }
    }
}

// ============================================================================
// Session Router
// ============================================================================

#[derive(Debug)]
pub struct SessionRouter {
    /// Session ids in creation order.
    order: Vec<SessionId>,
    sessions: HashMap<SessionId, Session>,
    by_process: HashMap<ProcessId, SessionId>,
    active: SessionId,
    next_seq: u64,
    supervisor: Option<SupervisorHandle>,
    clock: SharedClock,
    pane_config: PaneConfig,
    viewport: Rect,
}

impl SessionRouter {
    /// Creates a router holding one coordinator session, which is active.
    pub fn new(pane_config: PaneConfig, clock: SharedClock) -> Self {
        let first = SessionId::from_seq(1);
        let session = Session::new(
            first.clone(),
            ProcessRole::Coordinator,
            pane_config.clone(),
            clock.now(),
        );

        let mut sessions = HashMap::new();
        sessions.insert(first.clone(), session);

        Self {
            order: vec![first.clone()],
            sessions,
            by_process: HashMap::new(),
            active: first,
            next_seq: 2,
            supervisor: None,
            clock,
            pane_config,
            viewport: Rect::default(),
        }
    }

    /// Attaches the process supervisor used for spawn, send, and retire.
    #[must_use]
    pub fn with_supervisor(mut self, supervisor: SupervisorHandle) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    pub fn attach_supervisor(&mut self, supervisor: SupervisorHandle) {
        self.supervisor = Some(supervisor);
    }

    pub fn has_supervisor(&self) -> bool {
        self.supervisor.is_some()
    }

    // ========================================================================
    // Registry
    // ========================================================================

    /// Appends a new, unbound session. Does not change the active session.
    pub fn create_session(&mut self, role: ProcessRole) -> SessionId {
        let id = SessionId::from_seq(self.next_seq);
        self.next_seq += 1;

        let mut session = Session::new(id.clone(), role, self.pane_config.clone(), self.clock.now());
        session.pane.set_area(self.viewport);

        info!(session_id = %id, role = %role, "Session created");
        self.order.push(id.clone());
        self.sessions.insert(id.clone(), session);
        id
    }

    /// The id the next `create_session` call will return.
    pub fn peek_next_id(&self) -> SessionId {
        SessionId::from_seq(self.next_seq)
    }

    /// Routes events from `process_id` to `session_id`.
    ///
    /// Any earlier process id of the session stays mapped.
    pub fn bind_process(&mut self, session_id: &SessionId, process_id: ProcessId) -> DomainResult<()> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| DomainError::SessionNotFound {
                session_id: session_id.clone(),
            })?;

        debug!(
            session_id = %session_id,
            process_id = %process_id,
            previous = %session.process_id,
            "Binding process"
        );
        session.process_id = process_id.clone();
        self.by_process.insert(process_id, session_id.clone());
        Ok(())
    }

    /// Returns the session `process_id` routes to.
    pub fn session_for_process(&self, process_id: &ProcessId) -> Option<&SessionId> {
        self.by_process.get(process_id)
    }

    /// Retires a session. The last remaining session cannot be retired.
    ///
    /// If the session is active, the first other session in creation order
    /// becomes active first. A bound, still-running process is retired
    /// through the supervisor when one is attached.
    pub fn retire_session(&mut self, session_id: &SessionId) -> DomainResult<()> {
        if !self.sessions.contains_key(session_id) {
            return Err(DomainError::SessionNotFound {
                session_id: session_id.clone(),
            });
        }
        if self.order.len() <= 1 {
            return Err(DomainError::LastSession {
                session_id: session_id.clone(),
            });
        }

        if *session_id == self.active {
            if let Some(next) = self.order.iter().find(|id| *id != session_id).cloned() {
                self.switch_session(&next);
            }
        }

        self.order.retain(|id| id != session_id);
        self.by_process.retain(|_, id| id != session_id);
        let Some(session) = self.sessions.remove(session_id) else {
            return Ok(());
        };
        info!(session_id = %session_id, process_id = %session.process_id, "Session retired");

        // Stopped, Retired, and Failed processes have already exited.
        let exited = session.status.is_terminal() || session.status == ProcessStatus::Stopped;
        match &self.supervisor {
            Some(supervisor) if !session.process_id.is_empty() && !exited => {
                match supervisor.submit_retire(session.process_id.clone()) {
                    Ok(command_id) => {
                        debug!(command_id = %command_id, process_id = %session.process_id, "Retire submitted");
                    }
                    Err(e) => {
                        warn!(process_id = %session.process_id, error = %e, "Failed to submit retire");
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    // ========================================================================
    // Active Session
    // ========================================================================

    /// Makes `session_id` active and marks it read. Returns false if it
    /// doesn't exist.
    pub fn switch_session(&mut self, session_id: &SessionId) -> bool {
        let Some(session) = self.sessions.get_mut(session_id) else {
            return false;
        };
        session.has_new_content = false;
        self.active = session_id.clone();
        true
    }

    /// Activates the next session in creation order, wrapping around.
    pub fn next_session(&mut self) {
        if let Some(id) = self.neighbour(1) {
            self.switch_session(&id);
        }
    }

    /// Activates the previous session in creation order, wrapping around.
    pub fn previous_session(&mut self) {
        if let Some(id) = self.neighbour(self.order.len().saturating_sub(1)) {
            self.switch_session(&id);
        }
    }

    fn neighbour(&self, step: usize) -> Option<SessionId> {
        let len = self.order.len();
        if len == 0 {
            return None;
        }
        let index = self.order.iter().position(|id| *id == self.active)?;
        self.order.get((index + step) % len).cloned()
    }

    pub fn active_id(&self) -> &SessionId {
        &self.active
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.sessions.get(&self.active)
    }

    pub fn active_session_mut(&mut self) -> Option<&mut Session> {
        self.sessions.get_mut(&self.active)
    }

    pub fn session(&self, session_id: &SessionId) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    pub fn session_mut(&mut self, session_id: &SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(session_id)
    }

    /// Session ids in creation order.
    pub fn session_ids(&self) -> &[SessionId] {
        &self.order
    }

    /// Sessions in creation order.
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.order.iter().filter_map(|id| self.sessions.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // ========================================================================
    // Viewport
    // ========================================================================

    /// Places every session's pane in `area` (border included).
    pub fn set_viewport(&mut self, area: Rect) {
        if area == self.viewport {
            return;
        }
        self.viewport = area;
        for session in self.sessions.values_mut() {
            session.pane.set_area(area);
        }
    }

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    // ========================================================================
    // Supervisor Commands
    // ========================================================================

    /// Spawns a process for `session_id` from `template` and binds it.
    ///
    /// The spawn is only submitted here; failures arrive on the command log.
    pub fn spawn_for(&mut self, session_id: &SessionId, template: &ProcessSpec) -> Result<ProcessId> {
        let supervisor = self.supervisor.as_ref().ok_or(TuiError::NoSupervisor)?;
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| DomainError::SessionNotFound {
                session_id: session_id.clone(),
            })?;

        let (command_id, process_id) = supervisor.submit_spawn(template.for_role(session.role))?;
        info!(
            session_id = %session_id,
            process_id = %process_id,
            command_id = %command_id,
            "Spawn submitted"
        );

        session.status = ProcessStatus::Pending;
        session.last_error = None;
        session.queue_count = 0;
        session.content_dirty = true;

        self.bind_process(session_id, process_id.clone())?;
        Ok(process_id)
    }

    /// Sends `text` to the active session's process.
    ///
    /// The message shows up in the transcript once the supervisor reports it
    /// delivered.
    pub fn send_message(&mut self, text: String) -> Result<CommandId> {
        let supervisor = self.supervisor.as_ref().ok_or(TuiError::NoSupervisor)?;
        let session = self
            .sessions
            .get(&self.active)
            .ok_or_else(|| DomainError::SessionNotFound {
                session_id: self.active.clone(),
            })?;
        if session.process_id.is_empty() {
            return Err(TuiError::NoProcess {
                session_id: session.id.clone(),
            });
        }

        let command_id = supervisor.submit_send(session.process_id.clone(), text)?;
        debug!(command_id = %command_id, process_id = %session.process_id, "Send submitted");
        Ok(command_id)
    }

    /// Turns a failed command into a user-facing message.
    pub fn handle_command_log(&self, event: &CommandLogEvent) -> Option<String> {
        if event.success {
            debug!(command_id = %event.command_id, command = %event.command_type, "Command succeeded");
            return None;
        }

        let error = event.error.as_deref().unwrap_or("unknown error");
        warn!(
            command_id = %event.command_id,
            command = %event.command_type,
            error = %error,
            "Command failed"
        );
        let target = match &event.process_id {
            Some(process_id) => format!(" for {process_id}"),
            None => String::new(),
        };
        Some(format!("{} failed{target}: {error}", event.command_type))
    }

    // ========================================================================
    // Event Routing
    // ========================================================================

    /// Applies one process event to the session that owns its process.
    pub fn handle_event(&mut self, event: Event<ProcessEvent>) -> RouteOutcome {
        let Event {
            timestamp, payload, ..
        } = event;
        let ProcessEvent {
            process_id, kind, ..
        } = payload;

        let Some(session_id) = self.by_process.get(&process_id).cloned() else {
            debug!(process_id = %process_id, event = ?kind.event_type(), "Dropping event for unknown process");
            return RouteOutcome::Unrouted;
        };
        let Some(session) = self.sessions.get_mut(&session_id) else {
            warn!(session_id = %session_id, process_id = %process_id, "Process mapped to missing session");
            return RouteOutcome::Unrouted;
        };

        let mut alert = None;
        match kind {
            ProcessEventKind::Spawned => {
                debug!(session_id = %session_id, process_id = %process_id, "Process spawned");
            }
            ProcessEventKind::Ready => {
                if session.status == ProcessStatus::Working {
                    debug!(session_id = %session_id, "Turn complete");
                }
                session.status = ProcessStatus::Ready;

                if session.queue_count > 0 {
                    if let Some(supervisor) = &self.supervisor {
                        if let Err(e) = supervisor.submit_deliver_queued(process_id.clone()) {
                            warn!(process_id = %process_id, error = %e, "Failed to request queued delivery");
                            alert = Some(format!("deliver failed for {process_id}: {e}"));
                        }
                    }
                }
            }
            ProcessEventKind::Working => {
                session.status = ProcessStatus::Working;
            }
            ProcessEventKind::Output {
                text,
                delta,
                message_kind,
            } => match message_kind {
                MessageKind::ToolCall => {
                    session.push_message(ChatMessage::tool_call(text, timestamp));
                }
                MessageKind::Text if delta => {
                    session.append_delta(MessageRole::Agent, &text, timestamp);
                }
                MessageKind::Text => {
                    session.push_message(ChatMessage::text(MessageRole::Agent, text, timestamp));
                }
            },
            ProcessEventKind::Incoming { text } => {
                if !text.is_empty() {
                    session.push_message(ChatMessage::text(MessageRole::User, text, timestamp));
                }
            }
            ProcessEventKind::StatusChange { status } => {
                debug!(session_id = %session_id, from = %session.status, to = %status, "Status change");
                session.status = status;
            }
            ProcessEventKind::PhaseChanged { phase } => {
                session.phase = Some(phase);
            }
            ProcessEventKind::TokenUsage { metrics } => {
                session.metrics = metrics;
            }
            ProcessEventKind::QueueChanged { count } => {
                session.queue_count = count;
            }
            ProcessEventKind::Error { status, error } => {
                warn!(session_id = %session_id, process_id = %process_id, error = %error, "Process error");
                session.status = status;
                alert = Some(format!("{}: {error}", session.display_name()));
                session.last_error = Some(error);
            }
        }

        session.last_activity = self.clock.now();
        session.content_dirty = true;
        if session_id != self.active || !session.pane.at_bottom() {
            session.has_new_content = true;
        }

        match alert {
            Some(message) => RouteOutcome::Alert {
                session_id,
                message,
            },
            None => RouteOutcome::Routed(session_id),
        }
    }

    // ========================================================================
    // Aggregates
    // ========================================================================

    pub fn working_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.status == ProcessStatus::Working)
            .count()
    }

    pub fn queued_total(&self) -> usize {
        self.sessions.values().map(|s| s.queue_count).sum()
    }

    pub fn unread_count(&self) -> usize {
        self.sessions.values().filter(|s| s.has_new_content).count()
    }

    pub fn total_cost(&self) -> Money {
        self.sessions
            .values()
            .filter_map(|s| s.metrics.map(|m| m.total_cost))
            .fold(Money::default(), |acc, cost| acc + cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use conductor_core::{Clock, ManualClock, TokenCount, TokenMetrics};

    fn create_test_clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap())
    }

    fn create_test_router() -> (SessionRouter, ManualClock) {
        let clock = create_test_clock();
        let mut router = SessionRouter::new(PaneConfig::default(), clock.shared());
        router.set_viewport(Rect::new(0, 0, 60, 12));
        (router, clock)
    }

    /// Router with sessions A (active, bound to "coordinator-1") and B
    /// (bound to "worker-1").
    fn create_test_pair() -> (SessionRouter, SessionId, SessionId) {
        let (mut router, _) = create_test_router();
        let a = router.active_id().clone();
        let b = router.create_session(ProcessRole::Worker);
        router.bind_process(&a, ProcessId::new("coordinator-1")).unwrap();
        router.bind_process(&b, ProcessId::new("worker-1")).unwrap();
        (router, a, b)
    }

    fn event(process_id: &str, kind: ProcessEventKind) -> Event<ProcessEvent> {
        Event::new(
            ProcessEvent::new(process_id, ProcessRole::Worker, kind),
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
        )
    }

    fn output(process_id: &str, text: &str) -> Event<ProcessEvent> {
        Event::new(
            ProcessEvent::output(process_id, ProcessRole::Worker, text),
            Utc::now(),
        )
    }

    fn delta(process_id: &str, text: &str) -> Event<ProcessEvent> {
        Event::new(
            ProcessEvent::delta(process_id, ProcessRole::Worker, text),
            Utc::now(),
        )
    }

    #[test]
    fn test_new_router_has_one_active_session() {
        let (router, _) = create_test_router();
        assert_eq!(router.len(), 1);
        assert_eq!(router.active_id().as_str(), "session-1");
        let session = router.active_session().unwrap();
        assert_eq!(session.role, ProcessRole::Coordinator);
        assert_eq!(session.status, ProcessStatus::Pending);
    }

    #[test]
    fn test_queue_changed_on_inactive_session() {
        let (mut router, a, b) = create_test_pair();
        router.handle_event(event("coordinator-1", ProcessEventKind::QueueChanged { count: 3 }));
        router.session_mut(&a).unwrap().has_new_content = false;

        let outcome =
            router.handle_event(event("worker-1", ProcessEventKind::QueueChanged { count: 7 }));
        assert_eq!(outcome, RouteOutcome::Routed(b.clone()));

        let a = router.session(&a).unwrap();
        let b = router.session(&b).unwrap();
        assert_eq!(a.queue_count, 3);
        assert_eq!(b.queue_count, 7);
        assert!(b.has_new_content);
        assert!(!a.has_new_content);
    }

    #[test]
    fn test_unknown_process_is_dropped() {
        let (mut router, a, b) = create_test_pair();
        let outcome = router.handle_event(output("worker-99", "lost"));
        assert_eq!(outcome, RouteOutcome::Unrouted);
        assert!(router.session(&a).unwrap().messages.is_empty());
        assert!(router.session(&b).unwrap().messages.is_empty());
        assert!(!router.session(&b).unwrap().content_dirty);
    }

    #[test]
    fn test_spawned_does_not_change_status() {
        let (mut router, a, _) = create_test_pair();
        router.handle_event(event("coordinator-1", ProcessEventKind::Spawned));
        assert_eq!(router.session(&a).unwrap().status, ProcessStatus::Pending);
    }

    #[test]
    fn test_status_transitions() {
        let (mut router, a, _) = create_test_pair();
        let pid = "coordinator-1";

        router.handle_event(event(pid, ProcessEventKind::StatusChange {
            status: ProcessStatus::Starting,
        }));
        assert_eq!(router.session(&a).unwrap().status, ProcessStatus::Starting);

        router.handle_event(event(pid, ProcessEventKind::Ready));
        assert_eq!(router.session(&a).unwrap().status, ProcessStatus::Ready);

        router.handle_event(event(pid, ProcessEventKind::Working));
        assert_eq!(router.session(&a).unwrap().status, ProcessStatus::Working);

        router.handle_event(event(pid, ProcessEventKind::Ready));
        assert_eq!(router.session(&a).unwrap().status, ProcessStatus::Ready);
    }

    #[test]
    fn test_error_sets_status_and_alerts() {
        let (mut router, a, _) = create_test_pair();
        let outcome = router.handle_event(event(
            "coordinator-1",
            ProcessEventKind::Error {
                status: ProcessStatus::Failed,
                error: "exited with code 2".to_string(),
            },
        ));

        assert_eq!(outcome.alert(), Some("coordinator-1: exited with code 2"));
        let session = router.session(&a).unwrap();
        assert_eq!(session.status, ProcessStatus::Failed);
        assert_eq!(session.last_error.as_deref(), Some("exited with code 2"));
    }

    #[test]
    fn test_delta_accumulation() {
        let (mut router, a, _) = create_test_pair();
        router.handle_event(output("coordinator-1", "Hello"));
        router.handle_event(delta("coordinator-1", ", world"));

        let session = router.session(&a).unwrap();
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].content, "Hello, world");
    }

    #[test]
    fn test_delta_after_tool_call_starts_new_message() {
        let (mut router, a, _) = create_test_pair();
        router.handle_event(Event::new(
            ProcessEvent::tool_call("coordinator-1", ProcessRole::Coordinator, "Bash: ls"),
            Utc::now(),
        ));
        router.handle_event(delta("coordinator-1", "listing done"));

        let session = router.session(&a).unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].kind, MessageKind::ToolCall);
        assert_eq!(session.messages[0].content, "Bash: ls");
        assert_eq!(session.messages[1].content, "listing done");
    }

    #[test]
    fn test_delta_after_user_message_starts_new_message() {
        let (mut router, a, _) = create_test_pair();
        router.handle_event(event(
            "coordinator-1",
            ProcessEventKind::Incoming {
                text: "do it".to_string(),
            },
        ));
        router.handle_event(delta("coordinator-1", "ok"));

        let session = router.session(&a).unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].role, MessageRole::User);
        assert_eq!(session.messages[1].role, MessageRole::Agent);
    }

    #[test]
    fn test_empty_incoming_is_ignored() {
        let (mut router, a, _) = create_test_pair();
        router.handle_event(event(
            "coordinator-1",
            ProcessEventKind::Incoming {
                text: String::new(),
            },
        ));
        let session = router.session(&a).unwrap();
        assert!(session.messages.is_empty());
        assert!(session.content_dirty);
    }

    #[test]
    fn test_token_usage_replaces_snapshot() {
        let (mut router, a, _) = create_test_pair();
        let metrics = TokenMetrics {
            input_tokens: TokenCount::new(1_000),
            ..Default::default()
        };
        router.handle_event(event(
            "coordinator-1",
            ProcessEventKind::TokenUsage {
                metrics: Some(metrics),
            },
        ));
        assert_eq!(router.session(&a).unwrap().metrics, Some(metrics));

        router.handle_event(event("coordinator-1", ProcessEventKind::TokenUsage { metrics: None }));
        assert_eq!(router.session(&a).unwrap().metrics, None);
    }

    #[test]
    fn test_phase_changed() {
        let (mut router, a, _) = create_test_pair();
        router.handle_event(event(
            "coordinator-1",
            ProcessEventKind::PhaseChanged {
                phase: "planning".to_string(),
            },
        ));
        assert_eq!(router.session(&a).unwrap().phase.as_deref(), Some("planning"));
    }

    #[test]
    fn test_router_debug_includes_clock() {
        let (router, _clock) = create_test_router();
        let debug = format!("{router:?}");
        assert!(debug.contains("ManualClock"));
        assert!(debug.contains("session-1"));
    }

    #[test]
    fn test_last_activity_uses_clock() {
        let (mut router, clock) = create_test_router();
        let a = router.active_id().clone();
        router.bind_process(&a, ProcessId::new("coordinator-1")).unwrap();

        clock.advance(chrono::Duration::seconds(90));
        router.handle_event(output("coordinator-1", "tick"));

        let session = router.session(&a).unwrap();
        assert_eq!(session.last_activity, clock.now());
        assert_eq!(session.idle_seconds(clock.now()), 0);
        assert_eq!((session.last_activity - session.created_at).num_seconds(), 90);
    }

    #[test]
    fn test_active_scrolled_up_flags_new_content() {
        let (mut router, a, _) = create_test_pair();
        for i in 0..20 {
            router.handle_event(output("coordinator-1", &format!("line {i}")));
        }
        router.switch_session(&a);
        assert!(!router.session(&a).unwrap().has_new_content);

        router.session_mut(&a).unwrap().pane.scroll_up(5);
        router.handle_event(output("coordinator-1", "more"));
        assert!(router.session(&a).unwrap().has_new_content);
    }

    #[test]
    fn test_active_at_bottom_not_flagged() {
        let (mut router, a, _) = create_test_pair();
        router.handle_event(output("coordinator-1", "visible"));
        assert!(!router.session(&a).unwrap().has_new_content);
    }

    #[test]
    fn test_switch_session_clears_unread() {
        let (mut router, a, b) = create_test_pair();
        router.handle_event(output("worker-1", "background"));
        assert!(router.session(&b).unwrap().has_new_content);

        assert!(router.switch_session(&b));
        assert_eq!(router.active_id(), &b);
        assert!(!router.session(&b).unwrap().has_new_content);
        assert!(!router.session(&a).unwrap().has_new_content);
    }

    #[test]
    fn test_switch_to_unknown_session() {
        let (mut router, a, _) = create_test_pair();
        assert!(!router.switch_session(&SessionId::new("session-99")));
        assert_eq!(router.active_id(), &a);
    }

    #[test]
    fn test_next_and_previous_wrap() {
        let (mut router, a, b) = create_test_pair();
        let c = router.create_session(ProcessRole::Worker);

        router.next_session();
        assert_eq!(router.active_id(), &b);
        router.next_session();
        assert_eq!(router.active_id(), &c);
        router.next_session();
        assert_eq!(router.active_id(), &a);
        router.previous_session();
        assert_eq!(router.active_id(), &c);
    }

    #[test]
    fn test_retire_last_session_refused() {
        let (mut router, _) = create_test_router();
        let only = router.active_id().clone();
        let err = router.retire_session(&only).unwrap_err();
        assert!(matches!(err, DomainError::LastSession { .. }));
        assert_eq!(router.len(), 1);
    }

    #[test]
    fn test_retire_active_switches_first() {
        let (mut router, a, b) = create_test_pair();
        let c = router.create_session(ProcessRole::Worker);
        router.switch_session(&b);

        router.retire_session(&b).unwrap();
        assert_eq!(router.active_id(), &a);
        assert_eq!(router.session_ids(), &[a.clone(), c.clone()]);
        assert!(router.session_for_process(&ProcessId::new("worker-1")).is_none());

        router.retire_session(&a).unwrap();
        assert_eq!(router.active_id(), &c);
    }

    #[test]
    fn test_retired_session_events_are_dropped() {
        let (mut router, _, b) = create_test_pair();
        router.retire_session(&b).unwrap();
        let outcome = router.handle_event(output("worker-1", "straggler"));
        assert_eq!(outcome, RouteOutcome::Unrouted);
    }

    #[test]
    fn test_retire_without_supervisor_is_fine() {
        let (mut router, _, b) = create_test_pair();
        assert!(!router.has_supervisor());
        assert!(router.retire_session(&b).is_ok());
    }

    #[test]
    fn test_id_non_collision() {
        let (mut router, _) = create_test_router();
        let ids: Vec<_> = (0..5)
            .map(|_| router.create_session(ProcessRole::Worker))
            .collect();
        router.retire_session(&ids[2]).unwrap();

        let next = router.peek_next_id();
        assert!(router.session_ids().iter().all(|id| *id != next));
        assert_ne!(next, ids[2]);
        let created = router.create_session(ProcessRole::Worker);
        assert_eq!(created, next);
    }

    #[test]
    fn test_rebind_keeps_old_mapping() {
        let (mut router, a, _) = create_test_pair();
        router
            .bind_process(&a, ProcessId::new("coordinator-2"))
            .unwrap();

        router.handle_event(output("coordinator-1", "late"));
        router.handle_event(output("coordinator-2", "fresh"));

        let session = router.session(&a).unwrap();
        assert_eq!(session.process_id.as_str(), "coordinator-2");
        assert_eq!(session.messages.len(), 2);
    }

    #[test]
    fn test_bind_unknown_session() {
        let (mut router, _) = create_test_router();
        let err = router
            .bind_process(&SessionId::new("nope"), ProcessId::new("worker-1"))
            .unwrap_err();
        assert!(matches!(err, DomainError::SessionNotFound { .. }));
    }

    #[test]
    fn test_commands_need_supervisor() {
        let (mut router, a, _) = create_test_pair();
        let spec = ProcessSpec::new(ProcessRole::Worker, "cat");
        assert!(matches!(router.spawn_for(&a, &spec), Err(TuiError::NoSupervisor)));
        assert!(matches!(
            router.send_message("hi".to_string()),
            Err(TuiError::NoSupervisor)
        ));
    }

    #[test]
    fn test_command_log_failure_message() {
        let (router, _) = create_test_router();
        let ok = CommandLogEvent::succeeded(CommandId::new(1), conductor_core::CommandType::Send, None);
        assert!(router.handle_command_log(&ok).is_none());

        let failed = CommandLogEvent::failed(
            CommandId::new(2),
            conductor_core::CommandType::Spawn,
            Some(ProcessId::new("worker-1")),
            "failed to launch 'nope'",
        );
        assert_eq!(
            router.handle_command_log(&failed).as_deref(),
            Some("spawn failed for worker-1: failed to launch 'nope'")
        );
    }

    #[test]
    fn test_routing_isolation_over_interleavings() {
        // Small LCG so every run replays the same interleavings.
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            (seed >> 33) as usize
        };

        let kinds = |n: usize, i: usize| match n % 6 {
            0 => ProcessEventKind::Output {
                text: format!("out {i}"),
                delta: false,
                message_kind: MessageKind::Text,
            },
            1 => ProcessEventKind::Output {
                text: format!("+{i}"),
                delta: true,
                message_kind: MessageKind::Text,
            },
            2 => ProcessEventKind::QueueChanged { count: i },
            3 => ProcessEventKind::Working,
            4 => ProcessEventKind::Ready,
            _ => ProcessEventKind::TokenUsage {
                metrics: Some(TokenMetrics {
                    output_tokens: TokenCount::new(i as u64),
                    ..Default::default()
                }),
            },
        };

        for _ in 0..50 {
            let b_events: Vec<ProcessEventKind> =
                (0..30).map(|i| kinds(next(), i)).collect();

            // Reference: B's events alone.
            let (mut alone, _, b_alone) = create_test_pair();
            for kind in &b_events {
                alone.handle_event(event("worker-1", kind.clone()));
            }

            // Same B events interleaved with random A events.
            let (mut mixed, _, b_mixed) = create_test_pair();
            let mut b_iter = b_events.iter();
            let mut a_count = 0;
            loop {
                if next() % 2 == 0 {
                    a_count += 1;
                    mixed.handle_event(event("coordinator-1", kinds(next(), 1_000 + a_count)));
                    continue;
                }
                match b_iter.next() {
                    Some(kind) => {
                        mixed.handle_event(event("worker-1", kind.clone()));
                    }
                    None => break,
                }
            }

            let expected = alone.session(&b_alone).unwrap();
            let actual = mixed.session(&b_mixed).unwrap();
            assert_eq!(actual.messages, expected.messages);
            assert_eq!(actual.queue_count, expected.queue_count);
            assert_eq!(actual.status, expected.status);
            assert_eq!(actual.metrics, expected.metrics);
        }
    }
}
