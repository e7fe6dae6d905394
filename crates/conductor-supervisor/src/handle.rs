//! Client interface for interacting with the SupervisorActor.
//!
//! The `SupervisorHandle` is cheap to clone. It allocates command and process
//! identifiers itself, so callers learn a new process's id before the actor
//! has even seen the spawn request and can start routing its events at once.
//!
//! Two flavours of every mutating operation exist:
//! - `submit_*` enqueues the command without waiting. Completion is reported
//!   only on the command log. Used by the UI loop, which must never block.
//! - the async methods wait for the actor's reply.
//!
//! # Panic-Free Guarantees
//!
//! Channel errors are mapped to `SupervisorError::ChannelClosed` or
//! `SupervisorError::Busy`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use conductor_core::{CommandId, ProcessId, ProcessRole};
use tokio::sync::{mpsc, oneshot};

use crate::commands::{Delivery, ProcessSnapshot, ProcessSpec, SupervisorCommand, SupervisorError};

// ============================================================================
// Id Allocation
// ============================================================================

/// Monotonic counters shared by every clone of a handle.
#[derive(Debug, Default)]
struct IdAllocator {
    commands: AtomicU64,
    coordinators: AtomicU64,
    workers: AtomicU64,
    observers: AtomicU64,
}

impl IdAllocator {
    fn next_command(&self) -> CommandId {
        CommandId::new(self.commands.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Allocates `{role}-{n}`, numbering each role from 1.
    fn next_process(&self, role: ProcessRole) -> ProcessId {
        let counter = match role {
            ProcessRole::Coordinator => &self.coordinators,
            ProcessRole::Worker => &self.workers,
            ProcessRole::Observer => &self.observers,
        };
        let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
        ProcessId::new(format!("{}-{n}", role.short_name()))
    }
}

// ============================================================================
// Supervisor Handle
// ============================================================================

/// Handle for interacting with the supervisor actor.
///
/// # Usage
///
/// ```ignore
/// let handle = spawn_supervisor(config, events.clone(), command_log.clone());
///
/// // Fire-and-forget from the UI loop
/// let (command_id, process_id) = handle.submit_spawn(spec)?;
///
/// // Or wait for the result
/// let delivery = handle.send(process_id, "hello".to_string()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    sender: mpsc::Sender<SupervisorCommand>,
    ids: Arc<IdAllocator>,
}

impl SupervisorHandle {
    /// Create a new supervisor handle.
    pub fn new(sender: mpsc::Sender<SupervisorCommand>) -> Self {
        Self {
            sender,
            ids: Arc::new(IdAllocator::default()),
        }
    }

    /// Returns true if the actor is still running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }

    fn try_submit(&self, cmd: SupervisorCommand) -> Result<(), SupervisorError> {
        self.sender.try_send(cmd).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SupervisorError::Busy,
            mpsc::error::TrySendError::Closed(_) => SupervisorError::ChannelClosed,
        })
    }

    async fn request<T>(
        &self,
        cmd: SupervisorCommand,
        rx: oneshot::Receiver<Result<T, SupervisorError>>,
    ) -> Result<T, SupervisorError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| SupervisorError::ChannelClosed)?;

        rx.await.map_err(|_| SupervisorError::ChannelClosed)?
    }

    // ========================================================================
    // Fire-and-forget
    // ========================================================================

    /// Requests a spawn and returns the ids it will be reported under.
    ///
    /// # Errors
    ///
    /// - `SupervisorError::Busy` if the command channel is full
    /// - `SupervisorError::ChannelClosed` if the actor has shut down
    pub fn submit_spawn(&self, spec: ProcessSpec) -> Result<(CommandId, ProcessId), SupervisorError> {
        let command_id = self.ids.next_command();
        let process_id = self.ids.next_process(spec.role);
        self.try_submit(SupervisorCommand::Spawn {
            command_id,
            process_id: process_id.clone(),
            spec: Box::new(spec),
            respond_to: None,
        })?;
        Ok((command_id, process_id))
    }

    /// Requests delivery of `text` to a process.
    pub fn submit_send(&self, process_id: ProcessId, text: String) -> Result<CommandId, SupervisorError> {
        let command_id = self.ids.next_command();
        self.try_submit(SupervisorCommand::Send {
            command_id,
            process_id,
            text,
            respond_to: None,
        })?;
        Ok(command_id)
    }

    /// Requests delivery of the oldest queued message.
    pub fn submit_deliver_queued(&self, process_id: ProcessId) -> Result<CommandId, SupervisorError> {
        let command_id = self.ids.next_command();
        self.try_submit(SupervisorCommand::DeliverQueued {
            command_id,
            process_id,
            respond_to: None,
        })?;
        Ok(command_id)
    }

    /// Requests that a process be retired.
    pub fn submit_retire(&self, process_id: ProcessId) -> Result<CommandId, SupervisorError> {
        let command_id = self.ids.next_command();
        self.try_submit(SupervisorCommand::Retire {
            command_id,
            process_id,
            respond_to: None,
        })?;
        Ok(command_id)
    }

    // ========================================================================
    // Request / response
    // ========================================================================

    /// Spawns a process and waits until it is launched.
    ///
    /// # Errors
    ///
    /// - `SupervisorError::SpawnFailed` if the program could not be started
    /// - `SupervisorError::SupervisorFull` if at maximum capacity
    /// - `SupervisorError::ChannelClosed` if the actor has shut down
    pub async fn spawn(&self, spec: ProcessSpec) -> Result<ProcessId, SupervisorError> {
        let (tx, rx) = oneshot::channel();
        let cmd = SupervisorCommand::Spawn {
            command_id: self.ids.next_command(),
            process_id: self.ids.next_process(spec.role),
            spec: Box::new(spec),
            respond_to: Some(tx),
        };
        self.request(cmd, rx).await
    }

    /// Sends a message, queueing it while the process is busy.
    ///
    /// # Errors
    ///
    /// - `SupervisorError::ProcessNotFound` if no such process is live
    /// - `SupervisorError::NotAcceptingInput` if the process is stopping
    /// - `SupervisorError::QueueFull` if too many messages are waiting
    pub async fn send(&self, process_id: ProcessId, text: String) -> Result<Delivery, SupervisorError> {
        let (tx, rx) = oneshot::channel();
        let cmd = SupervisorCommand::Send {
            command_id: self.ids.next_command(),
            process_id,
            text,
            respond_to: Some(tx),
        };
        self.request(cmd, rx).await
    }

    /// Delivers the oldest queued message if the process is ready.
    pub async fn deliver_queued(&self, process_id: ProcessId) -> Result<Delivery, SupervisorError> {
        let (tx, rx) = oneshot::channel();
        let cmd = SupervisorCommand::DeliverQueued {
            command_id: self.ids.next_command(),
            process_id,
            respond_to: Some(tx),
        };
        self.request(cmd, rx).await
    }

    /// Starts retiring a process. Its `Retired` status follows on the event
    /// broker once the child has exited.
    pub async fn retire(&self, process_id: ProcessId) -> Result<(), SupervisorError> {
        let (tx, rx) = oneshot::channel();
        let cmd = SupervisorCommand::Retire {
            command_id: self.ids.next_command(),
            process_id,
            respond_to: Some(tx),
        };
        self.request(cmd, rx).await
    }

    /// Returns a snapshot of one process.
    ///
    /// Returns `None` if the process doesn't exist or if communication
    /// with the actor fails.
    pub async fn inspect(&self, process_id: ProcessId) -> Option<ProcessSnapshot> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(SupervisorCommand::Inspect {
                process_id,
                respond_to: tx,
            })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Retires every live process. Returns how many were signalled.
    pub async fn shutdown(&self) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(SupervisorCommand::Shutdown { respond_to: tx })
            .await
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or(0)
    }
}
