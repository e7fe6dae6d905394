//! Conductor TUI - Library modules
//!
//! This library provides the session router, the virtual transcript pane,
//! the text selection engine, and the terminal front end built on them.
//!
//! # Architecture
//!
//! The binary wires four kinds of tasks into one event loop:
//!
//! 1. **Terminal Task**: Polls for keyboard and mouse input
//! 2. **Broker Forwarders**: Forward process events and command log events
//! 3. **Supervisor Actor**: Owns the agent processes (see `conductor-supervisor`)
//! 4. **Main Event Loop**: Routes events into sessions and renders the UI
//!
//! All tasks respect a shared `CancellationToken` for graceful shutdown.
//!
//! The [`SessionRouter`] is the only owner of session state. It is driven
//! from the main loop alone, so no locking is involved.

pub mod app;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod input;
pub mod notify;
pub mod pane;
pub mod router;
pub mod selection;
pub mod session;
pub mod ui;

// Re-export commonly used types
pub use app::App;
pub use clipboard::{Clipboard, ClipboardError, SystemClipboard};
pub use config::{AppConfig, PaneConfig, RenderConfig};
pub use error::{Result, TuiError};
pub use notify::{Notification, NotificationLevel};
pub use pane::{PaneMouseOutcome, VirtualPane};
pub use router::{RouteOutcome, SessionRouter};
pub use selection::{Point, TextSelection};
pub use session::Session;
