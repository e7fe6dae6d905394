//! Application state for the conductor TUI.
//!
//! `App` wraps the [`SessionRouter`] with everything the terminal front end
//! needs on top of it: the input line, quit state, the current
//! notification, and the clipboard.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

use conductor_broker::Event as BrokerEvent;
use conductor_core::{CommandLogEvent, ProcessEvent, ProcessRole, ProcessStatus, SharedClock};
use conductor_supervisor::{ProcessSpec, SupervisorHandle};
use crossterm::event::MouseEvent;
use tracing::{debug, info, warn};

use crate::clipboard::Clipboard;
use crate::config::AppConfig;
use crate::error::{Result, TuiError};
use crate::notify::Notification;
use crate::pane::PaneMouseOutcome;
use crate::router::{RouteOutcome, SessionRouter};

/// Frames of the loading spinner, advanced once per tick.
const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

/// Application state.
pub struct App {
    pub router: SessionRouter,
    /// Text being typed into the input line.
    pub input: String,
    /// Flag indicating the app should exit.
    pub should_quit: bool,
    notification: Option<Notification>,
    clipboard: Option<Box<dyn Clipboard>>,
    /// What to launch for new sessions. `None` runs without processes.
    launch: Option<ProcessSpec>,
    config: AppConfig,
    clock: SharedClock,
    tick_count: usize,
}

impl App {
    /// Creates an app with one coordinator session and no supervisor.
    pub fn new(config: AppConfig, clock: SharedClock) -> Self {
        Self {
            router: SessionRouter::new(config.pane.clone(), clock.clone()),
            input: String::new(),
            should_quit: false,
            notification: None,
            clipboard: None,
            launch: None,
            config,
            clock,
            tick_count: 0,
        }
    }

    #[must_use]
    pub fn with_supervisor(mut self, supervisor: SupervisorHandle) -> Self {
        self.router.attach_supervisor(supervisor);
        self
    }

    #[must_use]
    pub fn with_clipboard(mut self, clipboard: Box<dyn Clipboard>) -> Self {
        self.clipboard = Some(clipboard);
        self
    }

    /// Sets the program launched for every session. The role is filled in
    /// per session.
    #[must_use]
    pub fn with_launch_spec(mut self, spec: ProcessSpec) -> Self {
        self.launch = Some(spec);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Spawns the coordinator and `workers` additional worker sessions.
    pub fn start(&mut self, workers: usize) -> Result<()> {
        let launch = self.launch.clone().ok_or(TuiError::NoSupervisor)?;

        let coordinator = self.router.active_id().clone();
        self.router.spawn_for(&coordinator, &launch)?;

        for _ in 0..workers {
            let session_id = self.router.create_session(ProcessRole::Worker);
            self.router.spawn_for(&session_id, &launch)?;
        }
        info!(workers, "Sessions started");
        Ok(())
    }

    /// Advances the spinner and drops an expired notification.
    pub fn tick(&mut self) {
        self.tick_count = self.tick_count.wrapping_add(1);
        let now = self.clock.now();
        if self.notification.as_ref().is_some_and(|n| n.is_expired(now)) {
            self.notification = None;
        }
    }

    pub fn spinner(&self) -> &'static str {
        SPINNER.get(self.tick_count % SPINNER.len()).copied().unwrap_or("|")
    }

    /// Signals the application to quit.
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    pub fn notify_info(&mut self, message: impl Into<String>) {
        let note = Notification::info(message, self.clock.now(), self.config.notification_ttl);
        self.notification = Some(note);
    }

    pub fn notify_error(&mut self, message: impl Into<String>) {
        let note = Notification::error(message, self.clock.now(), self.config.notification_ttl);
        self.notification = Some(note);
    }

    /// The notification to show, if it has not expired yet.
    pub fn notification(&self) -> Option<&Notification> {
        let now = self.clock.now();
        self.notification.as_ref().filter(|n| !n.is_expired(now))
    }

    // ========================================================================
    // Broker Events
    // ========================================================================

    /// Routes a process event and surfaces any alert it raises.
    pub fn handle_process_event(&mut self, event: BrokerEvent<ProcessEvent>) -> RouteOutcome {
        let outcome = self.router.handle_event(event);
        if let Some(message) = outcome.alert() {
            let message = message.to_string();
            self.notify_error(message);
        }
        outcome
    }

    /// Surfaces failed supervisor commands.
    pub fn handle_command_log(&mut self, event: &CommandLogEvent) {
        if let Some(message) = self.router.handle_command_log(event) {
            self.notify_error(message);
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Sends the input line to the active session.
    ///
    /// The input is kept on failure so it can be sent again.
    pub fn submit_input(&mut self) {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return;
        }

        match self.router.send_message(text) {
            Ok(command_id) => {
                debug!(command_id = %command_id, "Input submitted");
                self.input.clear();
            }
            Err(e) => {
                warn!(error = %e, "Failed to send input");
                self.notify_error(e.to_string());
            }
        }
    }

    /// Creates a worker session, makes it active, and spawns its process.
    pub fn new_worker_session(&mut self) {
        let session_id = self.router.create_session(ProcessRole::Worker);
        self.router.switch_session(&session_id);

        let Some(launch) = self.launch.clone() else {
            return;
        };
        if let Err(e) = self.router.spawn_for(&session_id, &launch) {
            warn!(session_id = %session_id, error = %e, "Failed to spawn worker");
            self.notify_error(e.to_string());
        }
    }

    /// Retires the active session. Refused for the last session.
    pub fn retire_active_session(&mut self) {
        let session_id = self.router.active_id().clone();
        match self.router.retire_session(&session_id) {
            Ok(()) => self.notify_info(format!("Retired {session_id}")),
            Err(e) => self.notify_error(e.to_string()),
        }
    }

    /// Respawns the active session's process after it failed or stopped.
    pub fn retry_active_session(&mut self) {
        let Some(session) = self.router.active_session() else {
            return;
        };
        if !(session.status == ProcessStatus::Failed || session.status == ProcessStatus::Stopped) {
            return;
        }
        let session_id = session.id.clone();

        let Some(launch) = self.launch.clone() else {
            self.notify_error(TuiError::NoSupervisor.to_string());
            return;
        };
        match self.router.spawn_for(&session_id, &launch) {
            Ok(process_id) => self.notify_info(format!("Restarting as {process_id}")),
            Err(e) => self.notify_error(e.to_string()),
        }
    }

    /// Returns true if the active session can be restarted.
    pub fn can_retry(&self) -> bool {
        self.launch.is_some()
            && self
                .router
                .active_session()
                .is_some_and(|s| matches!(s.status, ProcessStatus::Failed | ProcessStatus::Stopped))
    }

    // ========================================================================
    // Scrolling
    // ========================================================================

    pub fn scroll_page_up(&mut self) {
        if let Some(session) = self.router.active_session_mut() {
            session.pane.page_up();
        }
    }

    pub fn scroll_page_down(&mut self) {
        if let Some(session) = self.router.active_session_mut() {
            session.pane.page_down();
        }
    }

    pub fn scroll_to_top(&mut self) {
        if let Some(session) = self.router.active_session_mut() {
            session.pane.scroll_to_top();
        }
    }

    pub fn scroll_to_bottom(&mut self) {
        if let Some(session) = self.router.active_session_mut() {
            session.pane.scroll_to_bottom();
        }
    }

    // ========================================================================
    // Mouse & Clipboard
    // ========================================================================

    /// Forwards a mouse event to the active pane, copying a finished
    /// selection.
    pub fn handle_mouse(&mut self, event: MouseEvent) -> PaneMouseOutcome {
        let Some(session) = self.router.active_session_mut() else {
            return PaneMouseOutcome::Ignored;
        };
        let outcome = session.pane.handle_mouse(event);
        if let PaneMouseOutcome::Selected(text) = &outcome {
            let text = text.clone();
            self.copy_selection(&text);
        }
        outcome
    }

    /// Copies `text` and reports the result. Without a clipboard the
    /// selection is simply dropped.
    pub fn copy_selection(&mut self, text: &str) {
        let Some(clipboard) = self.clipboard.as_mut() else {
            return;
        };

        match clipboard.copy(text) {
            Ok(()) => {
                let count = text.chars().count();
                self.notify_info(format!("Copied {count} characters"));
            }
            Err(e) => {
                warn!(error = %e, "Clipboard copy failed");
                self.notify_error(TuiError::from(e).to_string());
            }
        }
    }

    // ========================================================================
    // Input Line
    // ========================================================================

    pub fn push_char(&mut self, c: char) {
        self.input.push(c);
    }

    pub fn backspace(&mut self) {
        self.input.pop();
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("router", &self.router)
            .field("input", &self.input)
            .field("should_quit", &self.should_quit)
            .field("notification", &self.notification)
            .field("clipboard", &self.clipboard.is_some())
            .field("launch", &self.launch)
            .finish()
    }
}
