//! Process lifecycle status and role.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Process Status
// ============================================================================

/// Lifecycle status of one spawned agent process.
///
/// ```text
/// Pending → Starting → Ready ⇄ Working ⇄ Paused/Stopped → Retiring → {Retired, Failed}
/// ```
///
/// `Retiring` is entered during a supervised replacement and is not
/// terminal: the process keeps running until it is replaced. `Retired` and
/// `Failed` are the only terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// Session exists but no process has started yet.
    #[default]
    Pending,
    /// Process launched, not yet accepting input.
    Starting,
    /// Idle and accepting input.
    Ready,
    /// Processing a turn.
    Working,
    /// Suspended by the supervisor.
    Paused,
    /// Exited cleanly without being asked to.
    Stopped,
    /// Replacement in progress.
    Retiring,
    /// Replaced or shut down on request.
    Retired,
    /// Crashed or reported a fatal error.
    Failed,
}

impl ProcessStatus {
    /// Returns true for `Retired` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Retired | Self::Failed)
    }

    /// Returns true for `Ready` and `Working`.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Ready | Self::Working)
    }

    /// Returns true while the process has not yet become usable.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Pending | Self::Starting)
    }

    /// Returns the display label for this status.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Working => "working",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Retiring => "retiring",
            Self::Retired => "retired",
            Self::Failed => "failed",
        }
    }

    /// Returns the ASCII icon for this status.
    #[must_use]
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Pending | Self::Starting => "~",
            Self::Ready => "-",
            Self::Working => ">",
            Self::Paused => "=",
            Self::Stopped => ".",
            Self::Retiring => "<",
            Self::Retired => "x",
            Self::Failed => "!",
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Process Role
// ============================================================================

/// What part an agent process plays in the orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessRole {
    /// The agent that plans and delegates.
    #[default]
    Coordinator,
    /// An agent executing delegated work.
    Worker,
    /// A passive agent watching the others.
    Observer,
}

impl ProcessRole {
    /// Returns a short identifier, also used as the process-id prefix.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Coordinator => "coordinator",
            Self::Worker => "worker",
            Self::Observer => "observer",
        }
    }
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ProcessStatus; 9] = [
        ProcessStatus::Pending,
        ProcessStatus::Starting,
        ProcessStatus::Ready,
        ProcessStatus::Working,
        ProcessStatus::Paused,
        ProcessStatus::Stopped,
        ProcessStatus::Retiring,
        ProcessStatus::Retired,
        ProcessStatus::Failed,
    ];

    #[test]
    fn test_only_retired_and_failed_are_terminal() {
        let terminal: Vec<_> = ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(
            terminal,
            vec![&ProcessStatus::Retired, &ProcessStatus::Failed]
        );
    }

    #[test]
    fn test_retiring_is_not_terminal() {
        assert!(!ProcessStatus::Retiring.is_terminal());
    }

    #[test]
    fn test_active_states() {
        let active: Vec<_> = ALL.iter().filter(|s| s.is_active()).collect();
        assert_eq!(active, vec![&ProcessStatus::Ready, &ProcessStatus::Working]);
    }

    #[test]
    fn test_default_is_pending() {
        assert_eq!(ProcessStatus::default(), ProcessStatus::Pending);
        assert!(ProcessStatus::default().is_loading());
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&ProcessStatus::Retiring).unwrap();
        assert_eq!(json, "\"retiring\"");
        let back: ProcessStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(back, ProcessStatus::Failed);
    }

    #[test]
    fn test_role_short_name() {
        assert_eq!(ProcessRole::Worker.to_string(), "worker");
    }
}
