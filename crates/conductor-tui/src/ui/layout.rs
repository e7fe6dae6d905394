//! Layout helpers for the conductor TUI.

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Main application layout areas.
///
/// The TUI is divided into four vertical sections:
/// - Header (3 lines): Title and summary counts
/// - Content (fills remaining): Split into session list (25%) and transcript (75%)
/// - Prompt (3 lines): Input line for the active session
/// - Footer (3 lines): Keybinding hints or the current notification
#[derive(Debug, Clone, Copy)]
pub struct AppLayout {
    pub header: Rect,
    /// Left panel for the session list
    pub list_area: Rect,
    /// Right panel for the active session's transcript
    pub transcript_area: Rect,
    pub prompt: Rect,
    pub footer: Rect,
}

impl AppLayout {
    /// Creates a new AppLayout by splitting the given area.
    pub fn new(area: Rect) -> Self {
        let [header, content, prompt, footer] = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(5),    // Content
                Constraint::Length(3), // Prompt
                Constraint::Length(3), // Footer
            ])
            .areas(area);

        let [list_area, transcript_area] = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(25), Constraint::Percentage(75)])
            .areas(content);

        Self {
            header,
            list_area,
            transcript_area,
            prompt,
            footer,
        }
    }
}
