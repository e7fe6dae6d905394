//! conductor - terminal supervisor for coordinator and worker agents
//!
//! Launches one coordinator process (and optionally workers), each bound to
//! its own chat session, and routes their output into independent
//! scrollable transcripts.
//!
//! # Usage
//!
//! ```text
//! conductor my-agent --flag          # one coordinator session
//! conductor -w 2 my-agent            # coordinator plus two workers
//! conductor -p json my-agent --jsonl # agents speaking JSON lines
//! ```

use std::fs::{self, OpenOptions};
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use conductor_broker::{Broker, BrokerConfig};
use conductor_core::{CommandLogEvent, EventPayload, ProcessEvent, ProcessRole, SystemClock};
use conductor_supervisor::{spawn_supervisor, LineProtocol, ProcessSpec, SupervisorConfig, SupervisorHandle};
use conductor_tui::input::{handle_key_event, handle_mouse_event, Action, Event};
use conductor_tui::{ui, App, AppConfig, PaneConfig, Result as TuiResult, SystemClipboard, TuiError};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CrosstermEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Events handled per frame before redrawing.
const MAX_EVENTS_PER_FRAME: usize = 256;

// ============================================================================
// CLI Arguments
// ============================================================================

/// conductor - supervise coordinator and worker agents in one terminal
#[derive(Parser, Debug)]
#[command(name = "conductor")]
#[command(about = "Run AI-agent processes side by side with per-session transcripts")]
#[command(version)]
struct Args {
    /// Number of worker sessions to start next to the coordinator
    #[arg(long, short = 'w', default_value_t = 0)]
    workers: usize,

    /// Line protocol the agents speak on stdin/stdout (plain or json)
    #[arg(long, short = 'p', default_value = "plain")]
    protocol: LineProtocol,

    /// Working directory for agent processes
    #[arg(long, short = 'C')]
    cwd: Option<PathBuf>,

    /// Maximum number of live agent processes
    #[arg(long)]
    max_processes: Option<usize>,

    /// Maximum messages queued per busy agent
    #[arg(long)]
    max_queued: Option<usize>,

    /// Lines scrolled per mouse wheel notch
    #[arg(long)]
    scroll_step: Option<usize>,

    /// Do not copy selections to the system clipboard
    #[arg(long)]
    no_clipboard: bool,

    /// Agent program to launch
    program: String,

    /// Arguments passed to the agent program
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl Args {
    fn launch_spec(&self) -> ProcessSpec {
        let spec = ProcessSpec::new(ProcessRole::Coordinator, &self.program)
            .with_args(&self.args)
            .with_protocol(self.protocol);
        match &self.cwd {
            Some(dir) => spec.with_working_dir(dir),
            None => spec,
        }
    }

    fn supervisor_config(&self) -> SupervisorConfig {
        let mut config = SupervisorConfig::default();
        if let Some(max) = self.max_processes {
            config = config.with_max_processes(max);
        }
        if let Some(max) = self.max_queued {
            config = config.with_max_queued(max);
        }
        config
    }

    fn app_config(&self) -> AppConfig {
        let mut pane = PaneConfig::default();
        if let Some(step) = self.scroll_step {
            pane = pane.with_scroll_step(step);
        }
        AppConfig::default().with_pane(pane)
    }
}

// ============================================================================
// Terminal Setup / Cleanup
// ============================================================================

/// Initializes the terminal: raw mode, alternate screen, and mouse capture.
fn setup_terminal() -> TuiResult<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().map_err(|e| TuiError::TerminalInit(e.to_string()))?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .map_err(|e| TuiError::TerminalInit(e.to_string()))?;

    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(|e| TuiError::TerminalInit(e.to_string()))
}

/// Restores the terminal to its original state.
///
/// This should always be called before exiting, even on error.
fn cleanup_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> TuiResult<()> {
    disable_raw_mode().map_err(|e| TuiError::TerminalCleanup(e.to_string()))?;

    execute!(terminal.backend_mut(), DisableMouseCapture, LeaveAlternateScreen)
        .map_err(|e| TuiError::TerminalCleanup(e.to_string()))?;

    terminal
        .show_cursor()
        .map_err(|e| TuiError::TerminalCleanup(e.to_string()))?;

    Ok(())
}

// ============================================================================
// Input Tasks
// ============================================================================

/// Spawns a task that polls for keyboard and mouse input.
///
/// crossterm's poll is synchronous, so each poll runs on the blocking pool
/// with a short timeout to allow cancellation checks.
fn spawn_terminal_task(
    event_tx: mpsc::UnboundedSender<Event>,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if cancel_token.is_cancelled() {
                debug!("Terminal input task shutting down");
                break;
            }

            let poll_result = tokio::task::spawn_blocking(|| {
                if event::poll(Duration::from_millis(50)).unwrap_or(false) {
                    event::read().ok()
                } else {
                    None
                }
            })
            .await;

            let event = match poll_result {
                Ok(Some(CrosstermEvent::Key(key))) => Event::Key(key),
                Ok(Some(CrosstermEvent::Mouse(mouse))) => Event::Mouse(mouse),
                Ok(Some(CrosstermEvent::Resize(width, height))) => Event::Resize(width, height),
                Ok(Some(_)) | Ok(None) => continue,
                Err(e) => {
                    error!(error = %e, "Terminal polling task panicked");
                    break;
                }
            };

            if event_tx.send(event).is_err() {
                debug!("Event channel closed, terminal input task exiting");
                break;
            }
        }
    })
}

/// Forwards everything published on `broker` into the main loop.
fn spawn_forwarder<P, F>(
    broker: &Broker<P>,
    event_tx: mpsc::UnboundedSender<Event>,
    cancel_token: CancellationToken,
    wrap: F,
) -> tokio::task::JoinHandle<()>
where
    P: EventPayload,
    F: Fn(conductor_broker::Event<P>) -> Event + Send + 'static,
{
    let mut rx = broker.subscribe(cancel_token);
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if event_tx.send(wrap(event)).is_err() {
                return;
            }
        }
        let _ = event_tx.send(Event::BrokerClosed);
    })
}

// ============================================================================
// Main Event Loop
// ============================================================================

/// Dispatches one event. Returns false when the app should stop.
fn dispatch(app: &mut App, event: Event) -> bool {
    match event {
        Event::Key(key) => {
            if handle_key_event(key, app) == Action::Quit {
                info!("User requested quit");
                return false;
            }
        }
        Event::Mouse(mouse) => {
            let _ = handle_mouse_event(mouse, app);
        }
        Event::Resize(width, height) => {
            debug!(width, height, "Terminal resized");
        }
        Event::Process(event) => {
            let _ = app.handle_process_event(event);
        }
        Event::Command(event) => {
            app.handle_command_log(&event.payload);
        }
        Event::BrokerClosed => {
            warn!("Event broker closed");
        }
    }
    !app.should_quit
}

/// Runs the main TUI event loop: tick, draw, wait for events, dispatch.
///
/// Events that are already waiting are drained before the next draw so a
/// burst of output costs one frame, not one frame per line.
async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    event_rx: &mut mpsc::UnboundedReceiver<Event>,
    cancel_token: &CancellationToken,
) -> Result<()> {
    let tick_rate = Duration::from_millis(100);

    loop {
        app.tick();
        terminal.draw(|frame| ui::render(frame, app))?;

        let first = match tokio::time::timeout(tick_rate, event_rx.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => {
                warn!("Event channel closed");
                break;
            }
            Err(_) => continue,
        };

        let mut running = dispatch(app, first);
        let mut handled = 1;
        while running && handled < MAX_EVENTS_PER_FRAME {
            let Ok(event) = event_rx.try_recv() else {
                break;
            };
            running = dispatch(app, event);
            handled += 1;
        }

        if !running || cancel_token.is_cancelled() {
            break;
        }
    }

    cancel_token.cancel();
    Ok(())
}

// ============================================================================
// Logging Setup
// ============================================================================

/// Returns the path to the log file directory.
///
/// Uses `$XDG_STATE_HOME/conductor` if set, then the platform state
/// directory, then `$HOME/.local/state/conductor`.
fn get_log_dir() -> Option<PathBuf> {
    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg_state).join("conductor"));
    }
    if let Some(state) = dirs::state_dir() {
        return Some(state.join("conductor"));
    }
    dirs::home_dir().map(|home| home.join(".local/state/conductor"))
}

/// Opens the log file in append mode. Returns `None` if logging is
/// unavailable; the reason is printed before the TUI takes the terminal.
fn create_log_file() -> Option<std::fs::File> {
    let log_dir = get_log_dir()?;

    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory {log_dir:?}: {e}");
        return None;
    }

    let log_path = log_dir.join("tui.log");
    match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: Failed to open log file {log_path:?}: {e}");
            None
        }
    }
}

/// Logs to a file; stderr shares the terminal with the TUI.
fn init_logging() {
    match create_log_file() {
        Some(file) => {
            let filter = EnvFilter::from_default_env().add_directive(
                "conductor=info"
                    .parse()
                    .unwrap_or_else(|_| tracing_subscriber::filter::Directive::from(tracing::Level::INFO)),
            );

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new("off"))
                .init();
        }
    }
}

async fn shutdown_supervisor(supervisor: &SupervisorHandle) {
    match tokio::time::timeout(Duration::from_secs(3), supervisor.shutdown()).await {
        Ok(stopped) => info!(stopped, "Supervisor stopped"),
        Err(_) => warn!("Supervisor did not stop in time"),
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging();
    info!(
        program = %args.program,
        workers = args.workers,
        protocol = %args.protocol,
        "conductor starting"
    );

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
    let cancel_token = CancellationToken::new();

    // Brokers and supervisor
    let events: Broker<ProcessEvent> = Broker::new(BrokerConfig::default());
    let command_log: Broker<CommandLogEvent> = Broker::new(BrokerConfig::default());
    let event_forwarder = spawn_forwarder(&events, event_tx.clone(), cancel_token.clone(), Event::Process);
    let command_forwarder =
        spawn_forwarder(&command_log, event_tx.clone(), cancel_token.clone(), Event::Command);
    let supervisor = spawn_supervisor(args.supervisor_config(), events.clone(), command_log.clone());

    // Application state
    let mut app = App::new(args.app_config(), SystemClock::shared())
        .with_supervisor(supervisor.clone())
        .with_launch_spec(args.launch_spec());
    if !args.no_clipboard {
        app = app.with_clipboard(Box::new(SystemClipboard::new()));
    }

    let mut terminal = match setup_terminal() {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "Failed to initialize terminal");
            shutdown_supervisor(&supervisor).await;
            return Err(e.into());
        }
    };

    if let Err(e) = app.start(args.workers) {
        warn!(error = %e, "Failed to start sessions");
        app.notify_error(e.to_string());
    }

    let input_handle = spawn_terminal_task(event_tx, cancel_token.clone());

    let result = run_event_loop(&mut terminal, &mut app, &mut event_rx, &cancel_token).await;

    cancel_token.cancel();
    shutdown_supervisor(&supervisor).await;
    events.close();
    command_log.close();

    let _ = tokio::time::timeout(Duration::from_millis(100), input_handle).await;
    let _ = tokio::time::timeout(Duration::from_millis(100), event_forwarder).await;
    let _ = tokio::time::timeout(Duration::from_millis(100), command_forwarder).await;

    if let Err(e) = cleanup_terminal(&mut terminal) {
        error!(error = %e, "Failed to cleanup terminal");
    }

    info!("conductor stopped");
    result
}
