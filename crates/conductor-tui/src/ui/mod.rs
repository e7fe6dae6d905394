//! UI rendering module for the conductor TUI.
//!
//! # Layout Structure
//!
//! ```text
//! +--------------------------------------------------+
//! |  Header: Title and summary counts                |  <- 3 lines
//! +------------+-------------------------------------+
//! | Sessions   |  Transcript (active session)        |  <- fills remaining
//! | (25%)      |  (75%)                              |
//! | >- coord.  |  Coordinator                        |
//! |  > worker  |  Working on it...                   |
//! +------------+-------------------------------------+
//! |  > input line                                    |  <- 3 lines
//! +--------------------------------------------------+
//! |  Footer: Keybinding hints / notification         |  <- 3 lines
//! +--------------------------------------------------+
//! ```

pub mod layout;
pub mod prompt;
pub mod session_list;
pub mod status_bar;
pub mod theme;
pub mod transcript;

use crate::app::App;
use layout::AppLayout;
use ratatui::Frame;

// Re-export commonly used items
pub use prompt::render_prompt;
pub use session_list::render_session_list;
pub use status_bar::{render_footer, render_header};
pub use transcript::render_transcript;

/// Renders the complete TUI interface.
///
/// Also hands the transcript area to the router, so every session's pane
/// wraps to the visible width and mouse events map to the right cells.
pub fn render(frame: &mut Frame, app: &mut App) {
    let layout = AppLayout::new(frame.area());
    app.router.set_viewport(layout.transcript_area);

    render_header(frame, layout.header, app);
    render_session_list(frame, layout.list_area, app);
    render_transcript(frame, layout.transcript_area, app);
    render_prompt(frame, layout.prompt, app);
    render_footer(frame, layout.footer, app);
}
