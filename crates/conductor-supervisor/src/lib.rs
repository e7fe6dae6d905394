//! Process supervisor using the Actor pattern.
//!
//! The supervisor owns every live agent subprocess. It receives commands via
//! a tokio mpsc channel, publishes [`ProcessEvent`]s onto the event broker,
//! and records the completion of every command as a [`CommandLogEvent`] on a
//! second broker.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐      ┌──────────────────┐      ┌──────────────────┐
//! │ SupervisorHandle │─────▶│ SupervisorActor  │─────▶│  Broker<Process  │
//! └──────────────────┘      └──────────────────┘      │     Event>       │
//!          │                   │            ▲         └──────────────────┘
//!          │ SupervisorCommand │            │ ProcessSignal        ▲
//!          │ (mpsc channel)    ▼            │                      │
//!          │            ┌──────────────┐  ┌─┴──────────────┐      │
//!          │            │ ProcessHandle│─▶│ stdout reader  │──────┘
//!          │            │ (child, stdin│  │ stderr reader  │
//!          ▼            │  writer)     │  │ lifecycle task │
//!   CommandLogEvent     └──────────────┘  └────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this crate follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use conductor_broker::Broker;
use conductor_core::{CommandLogEvent, ProcessEvent};
use tokio::sync::mpsc;

mod actor;
mod commands;
mod config;
mod handle;
mod process;
pub mod protocol;

pub use actor::SupervisorActor;
pub use commands::{Delivery, ProcessSnapshot, ProcessSpec, SupervisorCommand, SupervisorError};
pub use config::SupervisorConfig;
pub use handle::SupervisorHandle;
pub use process::{ExitOutcome, ProcessHandle};
pub use protocol::{AgentLine, LineProtocol};

/// Spawn the supervisor actor and return a handle for interaction.
///
/// Process events are published on `events`; command completions on
/// `command_log`. Must be called from within a tokio runtime.
///
/// # Example
///
/// ```no_run
/// use conductor_broker::Broker;
/// use conductor_core::ProcessRole;
/// use conductor_supervisor::{spawn_supervisor, ProcessSpec, SupervisorConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_supervisor(SupervisorConfig::default(), Broker::default(), Broker::default());
///     let spec = ProcessSpec::new(ProcessRole::Worker, "cat");
///     let _ = handle.spawn(spec).await;
/// }
/// ```
pub fn spawn_supervisor(
    config: SupervisorConfig,
    events: Broker<ProcessEvent>,
    command_log: Broker<CommandLogEvent>,
) -> SupervisorHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);

    let actor = SupervisorActor::new(cmd_rx, events, command_log, config);
    tokio::spawn(actor.run());

    SupervisorHandle::new(cmd_tx)
}
