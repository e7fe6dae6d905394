//! One supervised child process and its I/O tasks.
//!
//! Launching a [`ProcessHandle`] starts four tasks:
//! - a stdin writer fed through a bounded channel, so the actor never awaits
//!   a slow child
//! - a stdout reader that interprets each line with the process's
//!   [`LineProtocol`] and hands it to the actor, which publishes it
//! - a stderr reader that keeps the last few lines for failure reports
//! - a lifecycle task that waits for exit or cancellation and reports the
//!   outcome back to the actor

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use conductor_core::{ProcessEventKind, ProcessId, ProcessRole};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::commands::{ProcessSpec, SupervisorError};
use crate::config::SupervisorConfig;
use crate::protocol::LineProtocol;

/// Pending stdin lines per process.
const INPUT_BUFFER: usize = 32;

// ============================================================================
// Signals back to the actor
// ============================================================================

/// Process-originated notifications that change supervisor state.
#[derive(Debug)]
pub(crate) enum ProcessSignal {
    /// One interpreted stdout line, in the order the child wrote it.
    Reported {
        process_id: ProcessId,
        kind: ProcessEventKind,
    },
    /// The child exited and its stdout has been drained.
    Exited {
        process_id: ProcessId,
        outcome: ExitOutcome,
        stderr_tail: Option<String>,
    },
}

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Exit code, `None` if terminated by a signal.
    pub code: Option<i32>,
    /// True if the supervisor asked the process to stop.
    pub requested: bool,
}

impl ExitOutcome {
    /// Returns true for a clean, unrequested exit.
    pub fn is_clean(&self) -> bool {
        self.code == Some(0)
    }

    /// Human-readable description used in failure reports.
    pub fn describe(&self) -> String {
        match self.code {
            Some(code) => format!("exited with code {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

// ============================================================================
// Process Handle
// ============================================================================

/// Handle to one running child process.
///
/// Dropping the handle does not stop the child; call [`ProcessHandle::cancel`].
/// The child is killed when its lifecycle task observes the cancellation.
#[derive(Debug)]
pub struct ProcessHandle {
    process_id: ProcessId,
    role: ProcessRole,
    protocol: LineProtocol,
    pid: Option<u32>,
    session_ref: String,
    input: mpsc::Sender<String>,
    cancel: CancellationToken,
    exit: watch::Receiver<Option<ExitOutcome>>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
}

impl ProcessHandle {
    /// Launches `spec` and starts its I/O tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn spawn(
        spec: &ProcessSpec,
        process_id: ProcessId,
        signals: mpsc::Sender<ProcessSignal>,
        config: &SupervisorConfig,
    ) -> Result<Self, SupervisorError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|err| SupervisorError::spawn(&spec.program, err))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SupervisorError::spawn(&spec.program, "stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SupervisorError::spawn(&spec.program, "stdout unavailable"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SupervisorError::spawn(&spec.program, "stderr unavailable"))?;

        let pid = child.id();
        let session_ref = match pid {
            Some(pid) => format!("{} (pid {pid})", spec.program),
            None => spec.program.clone(),
        };

        let (input_tx, input_rx) = mpsc::channel(INPUT_BUFFER);
        let (exit_tx, exit_rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let stderr_tail = Arc::new(Mutex::new(VecDeque::new()));

        tokio::spawn(write_stdin(process_id.clone(), stdin, input_rx));
        let stdout_task = tokio::spawn(read_stdout(
            process_id.clone(),
            spec.protocol,
            stdout,
            signals.clone(),
        ));
        let stderr_task = tokio::spawn(read_stderr(
            process_id.clone(),
            stderr,
            Arc::clone(&stderr_tail),
            config.stderr_tail,
        ));
        tokio::spawn(watch_child(ChildWatch {
            process_id: process_id.clone(),
            child,
            cancel: cancel.clone(),
            stdout_task,
            stderr_task,
            drain_timeout: config.drain_timeout,
            exit: exit_tx,
            signals,
            stderr_tail: Arc::clone(&stderr_tail),
        }));

        debug!(process_id = %process_id, pid = ?pid, program = %spec.program, "Child process launched");

        Ok(Self {
            process_id,
            role: spec.role,
            protocol: spec.protocol,
            pid,
            session_ref,
            input: input_tx,
            cancel,
            exit: exit_rx,
            stderr_tail,
        })
    }

    pub fn process_id(&self) -> &ProcessId {
        &self.process_id
    }

    pub fn role(&self) -> ProcessRole {
        self.role
    }

    pub fn protocol(&self) -> LineProtocol {
        self.protocol
    }

    /// OS process id, if the child was still running at launch.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Human-readable reference such as `claude (pid 4242)`.
    pub fn session_ref(&self) -> &str {
        &self.session_ref
    }

    /// Queues one line for the child's stdin.
    pub fn write_line(&self, line: String) -> Result<(), SupervisorError> {
        self.input.try_send(line).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SupervisorError::Busy,
            mpsc::error::TrySendError::Closed(_) => {
                SupervisorError::StdinClosed(self.process_id.clone())
            }
        })
    }

    /// Asks the child to stop. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits for the child to exit.
    ///
    /// Returns `None` if the lifecycle task vanished without reporting.
    pub async fn wait(&self) -> Option<ExitOutcome> {
        let mut exit = self.exit.clone();
        let outcome = exit.wait_for(Option::is_some).await.ok()?;
        *outcome
    }

    /// Most recent stderr lines, oldest first.
    pub fn stderr_tail(&self) -> Vec<String> {
        self.stderr_tail.lock().iter().cloned().collect()
    }
}

// ============================================================================
// I/O Tasks
// ============================================================================

async fn write_stdin(process_id: ProcessId, mut stdin: ChildStdin, mut input: mpsc::Receiver<String>) {
    while let Some(line) = input.recv().await {
        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        }
        .await;

        if let Err(err) = written {
            warn!(process_id = %process_id, error = %err, "Failed to write to child stdin");
            break;
        }
        trace!(process_id = %process_id, bytes = line.len(), "Wrote line to child stdin");
    }
}

async fn read_stdout(
    process_id: ProcessId,
    protocol: LineProtocol,
    stdout: ChildStdout,
    signals: mpsc::Sender<ProcessSignal>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!(process_id = %process_id, error = %err, "Failed to read child stdout");
                break;
            }
        };

        let Some(kind) = protocol.interpret(&line) else {
            continue;
        };

        // Output and status lines share one channel so they publish in order.
        let signal = ProcessSignal::Reported {
            process_id: process_id.clone(),
            kind,
        };
        if signals.send(signal).await.is_err() {
            debug!(process_id = %process_id, "Supervisor gone, stopping stdout reader");
            break;
        }
    }
    trace!(process_id = %process_id, "Stdout reader finished");
}

async fn read_stderr(
    process_id: ProcessId,
    stderr: ChildStderr,
    tail: Arc<Mutex<VecDeque<String>>>,
    keep: usize,
) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(process_id = %process_id, line = %line, "Child stderr");
        if keep == 0 {
            continue;
        }
        let mut guard = tail.lock();
        if guard.len() >= keep {
            guard.pop_front();
        }
        guard.push_back(line);
    }
}

struct ChildWatch {
    process_id: ProcessId,
    child: Child,
    cancel: CancellationToken,
    stdout_task: JoinHandle<()>,
    stderr_task: JoinHandle<()>,
    drain_timeout: Duration,
    exit: watch::Sender<Option<ExitOutcome>>,
    signals: mpsc::Sender<ProcessSignal>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
}

async fn watch_child(watch: ChildWatch) {
    let ChildWatch {
        process_id,
        mut child,
        cancel,
        stdout_task,
        stderr_task,
        drain_timeout,
        exit,
        signals,
        stderr_tail,
    } = watch;

    let mut status = None;
    let requested = tokio::select! {
        () = cancel.cancelled() => true,
        result = child.wait() => {
            status = Some(result);
            false
        }
    };

    if requested {
        if let Err(err) = child.start_kill() {
            debug!(process_id = %process_id, error = %err, "Kill failed, child likely already exited");
        }
    }
    let status = match status {
        Some(status) => status,
        None => child.wait().await,
    };
    let code = match status {
        Ok(status) => status.code(),
        Err(err) => {
            warn!(process_id = %process_id, error = %err, "Failed to reap child");
            None
        }
    };

    // Let trailing output reach the actor before the exit is reported.
    let drained = tokio::time::timeout(drain_timeout, async {
        let _ = stdout_task.await;
        let _ = stderr_task.await;
    })
    .await;
    if drained.is_err() {
        debug!(process_id = %process_id, "Output still open after exit, not waiting further");
    }

    let outcome = ExitOutcome { code, requested };
    debug!(process_id = %process_id, code = ?code, requested, "Child process exited");
    exit.send_replace(Some(outcome));

    let stderr_tail = stderr_tail.lock().back().cloned();
    let signal = ProcessSignal::Exited {
        process_id: process_id.clone(),
        outcome,
        stderr_tail,
    };
    if signals.send(signal).await.is_err() {
        debug!(process_id = %process_id, "Supervisor gone before exit was reported");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use conductor_core::MessageKind;
    use tokio::time::timeout;

    fn create_test_signals() -> (mpsc::Sender<ProcessSignal>, mpsc::Receiver<ProcessSignal>) {
        mpsc::channel(16)
    }

    async fn next_report(signals: &mut mpsc::Receiver<ProcessSignal>) -> ProcessEventKind {
        let signal = timeout(Duration::from_secs(5), signals.recv())
            .await
            .expect("report should arrive")
            .expect("signal channel open");
        match signal {
            ProcessSignal::Reported { kind, .. } => kind,
            other => panic!("unexpected signal: {other:?}"),
        }
    }

    fn sh(script: &str) -> ProcessSpec {
        ProcessSpec::new(ProcessRole::Worker, "sh").with_args(["-c", script])
    }

    async fn next_exit(signals: &mut mpsc::Receiver<ProcessSignal>) -> (ExitOutcome, Option<String>) {
        loop {
            let signal = timeout(Duration::from_secs(5), signals.recv())
                .await
                .expect("exit should be reported")
                .expect("signal channel open");
            if let ProcessSignal::Exited {
                outcome,
                stderr_tail,
                ..
            } = signal
            {
                return (outcome, stderr_tail);
            }
        }
    }

    #[tokio::test]
    async fn test_cat_echoes_written_line() {
        let (sink, mut signals) = create_test_signals();
        let spec = ProcessSpec::new(ProcessRole::Worker, "cat");

        let handle = ProcessHandle::spawn(&spec, ProcessId::new("worker-1"), sink, &SupervisorConfig::default())
            .expect("cat should launch");
        assert!(handle.pid().is_some());
        assert!(handle.session_ref().starts_with("cat (pid "));

        handle.write_line("hello".to_string()).unwrap();

        assert_eq!(
            next_report(&mut signals).await,
            ProcessEventKind::Output {
                text: "hello".to_string(),
                delta: false,
                message_kind: MessageKind::Text,
            }
        );

        handle.cancel();
        let outcome = timeout(Duration::from_secs(5), handle.wait()).await.unwrap().unwrap();
        assert!(outcome.requested);
    }

    #[tokio::test]
    async fn test_exit_code_and_stderr_are_reported() {
        let (sink, mut signals) = create_test_signals();
        let handle = ProcessHandle::spawn(
            &sh("echo boom >&2; exit 3"),
            ProcessId::new("worker-2"),
            sink,
            &SupervisorConfig::default(),
        )
        .unwrap();

        let (outcome, tail) = next_exit(&mut signals).await;
        assert_eq!(outcome.code, Some(3));
        assert!(!outcome.requested);
        assert!(!outcome.is_clean());
        assert_eq!(outcome.describe(), "exited with code 3");
        assert_eq!(tail.as_deref(), Some("boom"));
        assert_eq!(handle.stderr_tail(), vec!["boom".to_string()]);
    }

    #[tokio::test]
    async fn test_lines_reach_actor_in_order() {
        let (sink, mut signals) = create_test_signals();
        let script = r#"echo '{"type":"working"}'; echo '{"type":"text","text":"step"}'; echo '{"type":"ready"}'"#;
        let spec = sh(script).with_protocol(LineProtocol::Json);
        let _handle =
            ProcessHandle::spawn(&spec, ProcessId::new("worker-3"), sink, &SupervisorConfig::default())
                .unwrap();

        // Output stays between the status lines it was written between
        assert_eq!(next_report(&mut signals).await, ProcessEventKind::Working);
        assert!(matches!(
            next_report(&mut signals).await,
            ProcessEventKind::Output { ref text, .. } if text == "step"
        ));
        assert_eq!(next_report(&mut signals).await, ProcessEventKind::Ready);
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let (sink, _signals) = create_test_signals();
        let spec = ProcessSpec::new(ProcessRole::Worker, "/nonexistent/conductor-agent");
        let result = ProcessHandle::spawn(&spec, ProcessId::new("worker-4"), sink, &SupervisorConfig::default());
        assert!(matches!(result, Err(SupervisorError::SpawnFailed { .. })));
    }

    #[tokio::test]
    async fn test_write_after_exit_reports_closed_stdin() {
        let (sink, mut signals) = create_test_signals();
        let handle =
            ProcessHandle::spawn(&sh("exit 0"), ProcessId::new("worker-5"), sink, &SupervisorConfig::default())
                .unwrap();
        let (outcome, _) = next_exit(&mut signals).await;
        assert!(outcome.is_clean());

        // The writer task exits on the first failed write; keep writing
        // until the channel notices.
        let mut closed = false;
        for _ in 0..50 {
            if let Err(SupervisorError::StdinClosed(_)) = handle.write_line("late".to_string()) {
                closed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(closed, "stdin should eventually report closed");
    }
}
