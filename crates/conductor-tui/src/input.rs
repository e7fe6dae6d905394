//! Keyboard and mouse input handling for the conductor TUI.
//!
//! This module provides the event type the main loop consumes and the
//! handlers that turn terminal input into app state changes.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

use conductor_broker::Event as BrokerEvent;
use conductor_core::{CommandLogEvent, ProcessEvent};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent};

use crate::app::App;
use crate::pane::PaneMouseOutcome;

// ============================================================================
// Event Types
// ============================================================================

/// Events that drive the main event loop.
#[derive(Debug, Clone)]
pub enum Event {
    /// Keyboard input from the user.
    Key(KeyEvent),

    /// Mouse input (wheel and selection).
    Mouse(MouseEvent),

    /// Terminal window resize event.
    Resize(u16, u16),

    /// An event published by an agent process.
    Process(BrokerEvent<ProcessEvent>),

    /// The outcome of a supervisor command.
    Command(BrokerEvent<CommandLogEvent>),

    /// A broker closed; no more events will arrive from it.
    BrokerClosed,
}

// ============================================================================
// Action Types
// ============================================================================

/// Actions that can result from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// No action required.
    None,

    /// Quit the application.
    Quit,
}

// ============================================================================
// Input Handlers
// ============================================================================

/// Handles a keyboard event and updates application state accordingly.
///
/// # Key Bindings
///
/// | Key               | Action                                |
/// |-------------------|---------------------------------------|
/// | `Ctrl+C`, `Ctrl+Q`| Quit the application                  |
/// | `Tab`             | Switch to the next session            |
/// | `Shift+Tab`       | Switch to the previous session        |
/// | `Ctrl+N`          | Create a worker session               |
/// | `Ctrl+W`          | Retire the active session             |
/// | `Ctrl+R`          | Restart a failed or stopped session   |
/// | `PageUp`/`PageDown` | Scroll the transcript by a page     |
/// | `Home`/`End`      | Jump to the top or bottom             |
/// | `Enter`           | Send the input line                   |
/// | `Esc`             | Clear the input line                  |
/// | `Backspace`       | Delete the last character             |
/// | any character     | Type into the input line              |
#[must_use]
pub fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') => {
                app.quit();
                Action::Quit
            }
            KeyCode::Char('n') => {
                app.new_worker_session();
                Action::None
            }
            KeyCode::Char('w') => {
                app.retire_active_session();
                Action::None
            }
            KeyCode::Char('r') => {
                app.retry_active_session();
                Action::None
            }
            _ => Action::None,
        };
    }

    match key.code {
        KeyCode::Tab => app.router.next_session(),
        KeyCode::BackTab => app.router.previous_session(),
        KeyCode::PageUp => app.scroll_page_up(),
        KeyCode::PageDown => app.scroll_page_down(),
        KeyCode::Home => app.scroll_to_top(),
        KeyCode::End => app.scroll_to_bottom(),
        KeyCode::Enter => app.submit_input(),
        KeyCode::Esc => app.clear_input(),
        KeyCode::Backspace => app.backspace(),
        KeyCode::Char(c) => app.push_char(c),
        _ => {}
    }
    Action::None
}

/// Handles a mouse event on the active transcript.
pub fn handle_mouse_event(mouse: MouseEvent, app: &mut App) -> PaneMouseOutcome {
    app.handle_mouse(mouse)
}

// ============================================================================
// Tests
// ============================================================================
