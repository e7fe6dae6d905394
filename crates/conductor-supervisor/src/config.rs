//! Supervisor tuning knobs.

use std::time::Duration;

/// Default command channel capacity.
pub const DEFAULT_COMMAND_BUFFER: usize = 100;

/// Default maximum number of live processes.
pub const DEFAULT_MAX_PROCESSES: usize = 64;

/// Default maximum number of messages queued per process.
pub const DEFAULT_MAX_QUEUED: usize = 32;

/// Default number of stderr lines kept per process.
pub const DEFAULT_STDERR_TAIL: usize = 20;

/// Configuration for the process supervisor.
///
/// Built with `Default` and refined with the `with_*` methods:
///
/// ```
/// use conductor_supervisor::SupervisorConfig;
///
/// let config = SupervisorConfig::default().with_max_processes(8);
/// assert_eq!(config.max_processes, 8);
/// ```
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Capacity of the command channel between handles and the actor.
    pub command_buffer: usize,
    /// Spawns beyond this many live processes are rejected.
    pub max_processes: usize,
    /// Sends beyond this many queued messages are rejected.
    pub max_queued: usize,
    /// Number of trailing stderr lines kept for failure reports.
    pub stderr_tail: usize,
    /// How long to wait for buffered stdout after a child exits.
    pub drain_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            command_buffer: DEFAULT_COMMAND_BUFFER,
            max_processes: DEFAULT_MAX_PROCESSES,
            max_queued: DEFAULT_MAX_QUEUED,
            stderr_tail: DEFAULT_STDERR_TAIL,
            drain_timeout: Duration::from_millis(500),
        }
    }
}

impl SupervisorConfig {
    /// Sets the command channel capacity (at least 1).
    #[must_use]
    pub fn with_command_buffer(mut self, command_buffer: usize) -> Self {
        self.command_buffer = command_buffer.max(1);
        self
    }

    /// Sets the live process limit.
    #[must_use]
    pub fn with_max_processes(mut self, max_processes: usize) -> Self {
        self.max_processes = max_processes;
        self
    }

    /// Sets the per-process queue limit.
    #[must_use]
    pub fn with_max_queued(mut self, max_queued: usize) -> Self {
        self.max_queued = max_queued;
        self
    }

    /// Sets how many stderr lines are kept.
    #[must_use]
    pub fn with_stderr_tail(mut self, stderr_tail: usize) -> Self {
        self.stderr_tail = stderr_tail;
        self
    }

    /// Sets the stdout drain timeout.
    #[must_use]
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }
}
