//! Supervisor actor - owns all child processes and processes commands.
//!
//! The SupervisorActor is the single owner of process state. It receives
//! commands from handles and signals from process I/O tasks, and publishes
//! events on the broker.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel send failures are logged but don't panic

use std::collections::{HashMap, VecDeque};

use conductor_broker::Broker;
use conductor_core::{
    CommandId, CommandLogEvent, CommandType, ProcessEvent, ProcessEventKind, ProcessId,
    ProcessRole, ProcessStatus,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::commands::{Delivery, ProcessSnapshot, ProcessSpec, SupervisorCommand, SupervisorError};
use crate::config::SupervisorConfig;
use crate::process::{ExitOutcome, ProcessHandle, ProcessSignal};

/// Capacity of the signal channel from process tasks to the actor.
const SIGNAL_BUFFER: usize = 256;

// ============================================================================
// Managed Process
// ============================================================================

/// Supervisor-side state for one live child.
#[derive(Debug)]
struct ManagedProcess {
    handle: ProcessHandle,
    status: ProcessStatus,
    queue: VecDeque<String>,
    retiring: bool,
}

impl ManagedProcess {
    fn role(&self) -> ProcessRole {
        self.handle.role()
    }

    fn snapshot(&self) -> ProcessSnapshot {
        ProcessSnapshot {
            process_id: self.handle.process_id().clone(),
            role: self.role(),
            status: self.status,
            queue_len: self.queue.len(),
            pid: self.handle.pid(),
            session_ref: self.handle.session_ref().to_string(),
        }
    }
}

// ============================================================================
// Supervisor Actor
// ============================================================================

/// The supervisor actor - owns all child processes.
///
/// Runs in a single task and processes commands and signals sequentially, so
/// a process's status can never change between checking it and acting on it.
pub struct SupervisorActor {
    receiver: mpsc::Receiver<SupervisorCommand>,
    signal_rx: mpsc::Receiver<ProcessSignal>,
    /// Cloned into every launched process.
    signal_tx: mpsc::Sender<ProcessSignal>,
    processes: HashMap<ProcessId, ManagedProcess>,
    events: Broker<ProcessEvent>,
    command_log: Broker<CommandLogEvent>,
    config: SupervisorConfig,
}

impl SupervisorActor {
    /// Creates a new supervisor actor.
    pub fn new(
        receiver: mpsc::Receiver<SupervisorCommand>,
        events: Broker<ProcessEvent>,
        command_log: Broker<CommandLogEvent>,
        config: SupervisorConfig,
    ) -> Self {
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_BUFFER);
        Self {
            receiver,
            signal_rx,
            signal_tx,
            processes: HashMap::new(),
            events,
            command_log,
            config,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until every handle is dropped, then cancels all
    /// remaining children.
    pub async fn run(mut self) {
        info!("Supervisor actor starting");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                Some(signal) = self.signal_rx.recv() => self.handle_signal(signal),
            }
        }

        for process in self.processes.values() {
            process.handle.cancel();
        }
        info!(
            "Supervisor actor stopped (processes: {})",
            self.processes.len()
        );
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: SupervisorCommand) {
        match cmd {
            SupervisorCommand::Spawn {
                command_id,
                process_id,
                spec,
                respond_to,
            } => {
                let result = self.handle_spawn(process_id.clone(), *spec);
                self.log_command(command_id, CommandType::Spawn, &process_id, &result);
                reply(respond_to, result);
            }
            SupervisorCommand::Send {
                command_id,
                process_id,
                text,
                respond_to,
            } => {
                let result = self.handle_send(&process_id, text);
                self.log_command(command_id, CommandType::Send, &process_id, &result);
                reply(respond_to, result);
            }
            SupervisorCommand::DeliverQueued {
                command_id,
                process_id,
                respond_to,
            } => {
                let result = self.handle_deliver_queued(&process_id);
                self.log_command(command_id, CommandType::DeliverQueued, &process_id, &result);
                reply(respond_to, result);
            }
            SupervisorCommand::Retire {
                command_id,
                process_id,
                respond_to,
            } => {
                let result = self.handle_retire(&process_id);
                self.log_command(command_id, CommandType::Retire, &process_id, &result);
                reply(respond_to, result);
            }
            SupervisorCommand::Inspect {
                process_id,
                respond_to,
            } => {
                let snapshot = self.processes.get(&process_id).map(ManagedProcess::snapshot);
                let _ = respond_to.send(snapshot);
            }
            SupervisorCommand::Shutdown { respond_to } => {
                let count = self.handle_shutdown();
                let _ = respond_to.send(count);
            }
        }
    }

    fn handle_signal(&mut self, signal: ProcessSignal) {
        match signal {
            ProcessSignal::Reported { process_id, kind } => self.handle_report(process_id, kind),
            ProcessSignal::Exited {
                process_id,
                outcome,
                stderr_tail,
            } => self.handle_exit(process_id, outcome, stderr_tail),
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_spawn(
        &mut self,
        process_id: ProcessId,
        spec: ProcessSpec,
    ) -> Result<ProcessId, SupervisorError> {
        if self.processes.len() >= self.config.max_processes {
            warn!(
                process_id = %process_id,
                current = self.processes.len(),
                max = self.config.max_processes,
                "Supervisor is full, rejecting spawn"
            );
            return Err(SupervisorError::SupervisorFull {
                max: self.config.max_processes,
            });
        }
        if self.processes.contains_key(&process_id) {
            return Err(SupervisorError::ProcessAlreadyExists(process_id));
        }

        let role = spec.role;
        self.emit(&process_id, role, ProcessEventKind::Spawned);
        self.emit(
            &process_id,
            role,
            ProcessEventKind::StatusChange {
                status: ProcessStatus::Starting,
            },
        );

        let signals = self.signal_tx.clone();
        let handle = match ProcessHandle::spawn(&spec, process_id.clone(), signals, &self.config) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(process_id = %process_id, program = %spec.program, error = %err, "Spawn failed");
                self.emit(
                    &process_id,
                    role,
                    ProcessEventKind::Error {
                        status: ProcessStatus::Failed,
                        error: err.to_string(),
                    },
                );
                return Err(err);
            }
        };

        let status = if spec.protocol.ready_on_spawn() {
            ProcessStatus::Ready
        } else {
            ProcessStatus::Starting
        };

        info!(
            process_id = %process_id,
            role = %role,
            protocol = %spec.protocol,
            session_ref = %handle.session_ref(),
            total_processes = self.processes.len() + 1,
            "Process spawned"
        );

        self.processes.insert(
            process_id.clone(),
            ManagedProcess {
                handle,
                status,
                queue: VecDeque::new(),
                retiring: false,
            },
        );

        if status == ProcessStatus::Ready {
            self.emit(&process_id, role, ProcessEventKind::Ready);
        }

        Ok(process_id)
    }

    fn handle_send(&mut self, process_id: &ProcessId, text: String) -> Result<Delivery, SupervisorError> {
        let max_queued = self.config.max_queued;
        let process = self
            .processes
            .get_mut(process_id)
            .ok_or_else(|| SupervisorError::ProcessNotFound(process_id.clone()))?;

        if process.retiring {
            return Err(SupervisorError::NotAcceptingInput {
                process_id: process_id.clone(),
                status: process.status,
            });
        }

        match process.status {
            ProcessStatus::Ready if process.queue.is_empty() => {
                deliver(&self.events, process, text)?;
                Ok(Delivery::Delivered)
            }
            ProcessStatus::Ready => {
                // Earlier messages are still waiting; they go first.
                deliver_front(&self.events, process)?;
                if process.status == ProcessStatus::Ready && process.queue.is_empty() {
                    deliver(&self.events, process, text)?;
                    return Ok(Delivery::Delivered);
                }
                Ok(enqueue(&self.events, process, text))
            }
            ProcessStatus::Starting | ProcessStatus::Working => {
                if process.queue.len() >= max_queued {
                    return Err(SupervisorError::QueueFull {
                        process_id: process_id.clone(),
                        max: max_queued,
                    });
                }
                Ok(enqueue(&self.events, process, text))
            }
            status => Err(SupervisorError::NotAcceptingInput {
                process_id: process_id.clone(),
                status,
            }),
        }
    }

    fn handle_deliver_queued(&mut self, process_id: &ProcessId) -> Result<Delivery, SupervisorError> {
        let process = self
            .processes
            .get_mut(process_id)
            .ok_or_else(|| SupervisorError::ProcessNotFound(process_id.clone()))?;

        if process.queue.is_empty() {
            return Ok(Delivery::Empty);
        }
        if process.status != ProcessStatus::Ready || process.retiring {
            // Raced with another turn; stays queued until the next Ready.
            return Ok(Delivery::Queued {
                depth: process.queue.len(),
            });
        }

        deliver_front(&self.events, process)
    }

    fn handle_retire(&mut self, process_id: &ProcessId) -> Result<(), SupervisorError> {
        let process = self
            .processes
            .get_mut(process_id)
            .ok_or_else(|| SupervisorError::ProcessNotFound(process_id.clone()))?;

        if process.retiring {
            debug!(process_id = %process_id, "Process already retiring");
            return Ok(());
        }
        begin_retire(&self.events, process);
        info!(process_id = %process_id, "Process retiring");
        Ok(())
    }

    fn handle_shutdown(&mut self) -> usize {
        let mut count = 0;
        for process in self.processes.values_mut() {
            if !process.retiring {
                begin_retire(&self.events, process);
                count += 1;
            }
        }
        info!(count, "Shutting down all processes");
        count
    }

    // ========================================================================
    // Signal Handlers
    // ========================================================================

    fn handle_report(&mut self, process_id: ProcessId, kind: ProcessEventKind) {
        let Some(process) = self.processes.get_mut(&process_id) else {
            debug!(process_id = %process_id, "Report from unknown process, ignoring");
            return;
        };
        let changes_status = matches!(
            kind,
            ProcessEventKind::Ready | ProcessEventKind::Working | ProcessEventKind::Error { .. }
        );
        if changes_status && (process.retiring || process.status.is_terminal()) {
            debug!(process_id = %process_id, status = %process.status, "Status report after shutdown began, ignoring");
            return;
        }

        match &kind {
            ProcessEventKind::Ready => process.status = ProcessStatus::Ready,
            ProcessEventKind::Working => process.status = ProcessStatus::Working,
            ProcessEventKind::Error { status, error } => {
                warn!(process_id = %process_id, error = %error, "Agent reported error");
                process.status = *status;
            }
            _ => {}
        }
        let role = process.role();
        let failed = matches!(kind, ProcessEventKind::Error { .. }) && process.status.is_terminal();
        emit_to(&self.events, &process_id, role, kind);

        // The failure is already published; the exit that follows stays quiet.
        if failed {
            if !process.queue.is_empty() {
                process.queue.clear();
                emit_to(&self.events, &process_id, role, ProcessEventKind::QueueChanged { count: 0 });
            }
            process.handle.cancel();
        }
    }

    fn handle_exit(&mut self, process_id: ProcessId, outcome: ExitOutcome, stderr_tail: Option<String>) {
        let Some(process) = self.processes.remove(&process_id) else {
            debug!(process_id = %process_id, "Exit from unknown process, ignoring");
            return;
        };
        let role = process.role();

        if process.status.is_terminal() && !process.retiring {
            debug!(process_id = %process_id, status = %process.status, "Process exited after terminal status");
        } else if process.retiring || outcome.requested {
            info!(process_id = %process_id, "Process retired");
            self.emit(
                &process_id,
                role,
                ProcessEventKind::StatusChange {
                    status: ProcessStatus::Retired,
                },
            );
        } else if outcome.is_clean() {
            info!(process_id = %process_id, "Process stopped");
            self.emit(
                &process_id,
                role,
                ProcessEventKind::StatusChange {
                    status: ProcessStatus::Stopped,
                },
            );
        } else {
            let error = match stderr_tail {
                Some(line) if !line.trim().is_empty() => format!("{}: {}", outcome.describe(), line.trim()),
                _ => outcome.describe(),
            };
            warn!(process_id = %process_id, error = %error, "Process failed");
            self.emit(
                &process_id,
                role,
                ProcessEventKind::Error {
                    status: ProcessStatus::Failed,
                    error,
                },
            );
        }

        debug!(remaining = self.processes.len(), "Process removed");
    }

    // ========================================================================
    // Publishing
    // ========================================================================

    fn emit(&self, process_id: &ProcessId, role: ProcessRole, kind: ProcessEventKind) {
        emit_to(&self.events, process_id, role, kind);
    }

    fn log_command<T>(
        &self,
        command_id: CommandId,
        command_type: CommandType,
        process_id: &ProcessId,
        result: &Result<T, SupervisorError>,
    ) {
        let process_id = Some(process_id.clone());
        let event = match result {
            Ok(_) => CommandLogEvent::succeeded(command_id, command_type, process_id),
            Err(err) => {
                debug!(command_id = %command_id, command = %command_type, error = %err, "Command failed");
                CommandLogEvent::failed(command_id, command_type, process_id, err.to_string())
            }
        };
        self.command_log.publish(event);
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn emit_to(events: &Broker<ProcessEvent>, process_id: &ProcessId, role: ProcessRole, kind: ProcessEventKind) {
    events.publish(ProcessEvent::new(process_id.clone(), role, kind));
}

/// Writes `text` to a ready process and records the new turn.
fn deliver(
    events: &Broker<ProcessEvent>,
    process: &mut ManagedProcess,
    text: String,
) -> Result<(), SupervisorError> {
    let protocol = process.handle.protocol();
    let line = protocol.encode_input(&text)?;
    process.handle.write_line(line)?;

    let process_id = process.handle.process_id().clone();
    let role = process.role();
    emit_to(events, &process_id, role, ProcessEventKind::Incoming { text });

    if protocol.reports_turns() {
        process.status = ProcessStatus::Working;
        emit_to(events, &process_id, role, ProcessEventKind::Working);
    }
    Ok(())
}

/// Appends `text` to the process queue and publishes the new depth.
fn enqueue(events: &Broker<ProcessEvent>, process: &mut ManagedProcess, text: String) -> Delivery {
    process.queue.push_back(text);
    let depth = process.queue.len();
    let process_id = process.handle.process_id().clone();
    debug!(process_id = %process_id, depth, "Message queued");
    emit_to(events, &process_id, process.role(), ProcessEventKind::QueueChanged { count: depth });
    Delivery::Queued { depth }
}

/// Delivers the oldest queued message. On failure it stays at the front.
fn deliver_front(events: &Broker<ProcessEvent>, process: &mut ManagedProcess) -> Result<Delivery, SupervisorError> {
    let Some(text) = process.queue.pop_front() else {
        return Ok(Delivery::Empty);
    };
    if let Err(err) = deliver(events, process, text.clone()) {
        process.queue.push_front(text);
        return Err(err);
    }
    let process_id = process.handle.process_id().clone();
    emit_to(
        events,
        &process_id,
        process.role(),
        ProcessEventKind::QueueChanged {
            count: process.queue.len(),
        },
    );
    Ok(Delivery::Delivered)
}

fn begin_retire(events: &Broker<ProcessEvent>, process: &mut ManagedProcess) {
    let process_id = process.handle.process_id().clone();
    let role = process.role();

    process.retiring = true;
    process.status = ProcessStatus::Retiring;
    emit_to(
        events,
        &process_id,
        role,
        ProcessEventKind::StatusChange {
            status: ProcessStatus::Retiring,
        },
    );

    if !process.queue.is_empty() {
        process.queue.clear();
        emit_to(events, &process_id, role, ProcessEventKind::QueueChanged { count: 0 });
    }
    process.handle.cancel();
}

fn reply<T>(respond_to: Option<oneshot::Sender<T>>, value: T) {
    if let Some(tx) = respond_to {
        // Ignore send error - caller may have dropped the receiver
        let _ = tx.send(value);
    }
}
