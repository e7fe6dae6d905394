//! Configuration for the TUI.
//!
//! There is no config file: defaults are compiled in and the binary adjusts
//! them through the `with_*` builders.

use chrono::Duration;
use conductor_core::{MessageRole, ProcessRole};
use ratatui::style::Color;

/// Default number of lines scrolled per mouse wheel notch.
pub const DEFAULT_SCROLL_STEP: usize = 3;

/// Default number of lines rendered ahead of and behind the viewport.
pub const DEFAULT_PREWARM_BUFFER: usize = 20;

/// Default lifetime of a notification, in seconds.
pub const DEFAULT_NOTIFICATION_SECS: i64 = 4;

// ============================================================================
// Render Config
// ============================================================================

/// Label and color used to attribute a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    pub label: String,
    pub color: Color,
}

impl Attribution {
    pub fn new(label: impl Into<String>, color: Color) -> Self {
        Self {
            label: label.into(),
            color,
        }
    }
}

/// How transcript messages are laid out by the pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    pub agent: Attribution,
    pub user: Attribution,
    pub system: Attribution,
    /// Prefix for the first line of a tool-call message.
    pub tool_marker: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            agent: Attribution::new("Agent", Color::Cyan),
            user: Attribution::new("You", Color::Green),
            system: Attribution::new("conductor", Color::Yellow),
            tool_marker: "-> ".to_string(),
        }
    }
}

impl RenderConfig {
    /// Returns the attribution for a message role.
    pub fn attribution(&self, role: MessageRole) -> &Attribution {
        match role {
            MessageRole::Agent => &self.agent,
            MessageRole::User => &self.user,
            MessageRole::System => &self.system,
        }
    }

    #[must_use]
    pub fn with_agent(mut self, label: impl Into<String>, color: Color) -> Self {
        self.agent = Attribution::new(label, color);
        self
    }

    #[must_use]
    pub fn with_user(mut self, label: impl Into<String>, color: Color) -> Self {
        self.user = Attribution::new(label, color);
        self
    }

    /// Labels agent output after the process role, e.g. "Coordinator".
    #[must_use]
    pub fn for_role(self, role: ProcessRole) -> Self {
        let color = self.agent.color;
        let label = match role {
            ProcessRole::Coordinator => "Coordinator",
            ProcessRole::Worker => "Worker",
            ProcessRole::Observer => "Observer",
        };
        self.with_agent(label, color)
    }
}

// ============================================================================
// Pane Config
// ============================================================================

/// Behaviour of one virtual text pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneConfig {
    /// Lines scrolled per wheel notch.
    pub scroll_step: usize,
    /// Lines rendered into the cache on each side of the viewport.
    pub prewarm_buffer: usize,
    pub render: RenderConfig,
}

impl Default for PaneConfig {
    fn default() -> Self {
        Self {
            scroll_step: DEFAULT_SCROLL_STEP,
            prewarm_buffer: DEFAULT_PREWARM_BUFFER,
            render: RenderConfig::default(),
        }
    }
}

impl PaneConfig {
    /// Sets the wheel scroll step (minimum 1).
    #[must_use]
    pub fn with_scroll_step(mut self, lines: usize) -> Self {
        self.scroll_step = lines.max(1);
        self
    }

    #[must_use]
    pub fn with_prewarm_buffer(mut self, lines: usize) -> Self {
        self.prewarm_buffer = lines;
        self
    }

    #[must_use]
    pub fn with_render(mut self, render: RenderConfig) -> Self {
        self.render = render;
        self
    }
}

// ============================================================================
// App Config
// ============================================================================

/// Top-level TUI configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub pane: PaneConfig,
    /// How long a notification stays in the footer.
    pub notification_ttl: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pane: PaneConfig::default(),
            notification_ttl: Duration::seconds(DEFAULT_NOTIFICATION_SECS),
        }
    }
}

impl AppConfig {
    #[must_use]
    pub fn with_pane(mut self, pane: PaneConfig) -> Self {
        self.pane = pane;
        self
    }

    #[must_use]
    pub fn with_notification_ttl(mut self, ttl: Duration) -> Self {
        self.notification_ttl = ttl;
        self
    }
}
