//! Input line for the active session.

use crate::app::App;
use crate::selection::display_width;
use ratatui::{
    layout::{Position, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

const PROMPT: &str = "> ";

/// Renders the input line and places the cursor after the typed text.
pub fn render_prompt(frame: &mut Frame, area: Rect, app: &App) {
    let title = match app.router.active_session() {
        Some(session) => format!(" Message {} ", session.display_name()),
        None => " Message ".to_string(),
    };

    let line = Line::from(vec![
        Span::styled(PROMPT, Style::default().fg(Color::Cyan)),
        Span::raw(app.input.clone()),
    ]);
    let prompt = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(Color::White)),
    );
    frame.render_widget(prompt, area);

    if area.width > 2 && area.height > 2 {
        frame.set_cursor_position(cursor_position(area, &app.input));
    }
}

/// Cursor cell after `input`, kept inside the border.
fn cursor_position(area: Rect, input: &str) -> Position {
    let typed = display_width(PROMPT).saturating_add(display_width(input));
    let max = usize::from(area.width.saturating_sub(3));
    let offset = u16::try_from(typed.min(max)).unwrap_or(0);
    Position::new(area.x + 1 + offset, area.y + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_follows_input() {
        let area = Rect::new(0, 20, 40, 3);
        assert_eq!(cursor_position(area, ""), Position::new(3, 21));
        assert_eq!(cursor_position(area, "hi"), Position::new(5, 21));
        // Wide characters take two cells
        assert_eq!(cursor_position(area, "日本"), Position::new(7, 21));
    }

    #[test]
    fn test_cursor_clamped_to_border() {
        let area = Rect::new(0, 0, 10, 3);
        let long = "x".repeat(50);
        assert_eq!(cursor_position(area, &long), Position::new(8, 1));
    }
}
