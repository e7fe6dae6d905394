//! Session list widget for the conductor TUI.
//!
//! One row per session in creation order, with status, queue depth, and an
//! unread marker.

use crate::app::App;
use crate::session::Session;
use crate::ui::theme::{status_color, status_icon};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
    Frame,
};

/// Renders the session list in the left panel.
///
/// Row format: `> [icon] [name] [queue] [*]`
pub fn render_session_list(frame: &mut Frame, area: Rect, app: &App) {
    let active = app.router.active_id();
    let spinner = app.spinner();

    let items: Vec<ListItem> = app
        .router
        .sessions()
        .map(|session| create_session_item(session, session.id == *active, spinner))
        .collect();

    let title = format!(" Sessions ({}) ", app.router.len());
    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(Color::White)),
    );

    frame.render_widget(list, area);
}

fn create_session_item(session: &Session, is_active: bool, spinner: &'static str) -> ListItem<'static> {
    let style = if is_active {
        Style::default().bg(Color::Rgb(30, 30, 40))
    } else {
        Style::default()
    };
    ListItem::new(session_line(session, is_active, spinner)).style(style)
}

fn session_line(session: &Session, is_active: bool, spinner: &'static str) -> Line<'static> {
    let mut spans = vec![
        Span::styled(
            if is_active { ">" } else { " " },
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("{} ", status_icon(session.status, spinner)),
            Style::default()
                .fg(status_color(session.status))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(session.display_name(), Style::default().fg(Color::White)),
    ];

    if session.queue_count > 0 {
        spans.push(Span::styled(
            format!(" [{}]", session.queue_count),
            Style::default().fg(Color::Yellow),
        ));
    }
    if session.has_new_content {
        spans.push(Span::styled(
            " *",
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        ));
    }

    Line::from(spans)
}
