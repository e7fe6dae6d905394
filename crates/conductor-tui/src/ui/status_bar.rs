//! Header and footer status bar widgets for the conductor TUI.
//!
//! The status bar provides:
//! - Header: Application title and summary counts across all sessions
//! - Footer: Keybinding hints, replaced by the current notification

use crate::app::App;
use crate::notify::Notification;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Renders the header bar with title and summary statistics.
pub fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let header_line = Line::from(vec![
        Span::styled(
            "conductor",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(summary(app), Style::default().fg(Color::DarkGray)),
    ]);

    let border_color = if app.router.sessions().any(|s| s.status.is_terminal()) {
        Color::Yellow
    } else {
        Color::Green
    };
    let header = Paragraph::new(header_line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color)),
    );

    frame.render_widget(header, area);
}

/// " | 3 sessions | $0.42 | 1 working | 2 queued | 1 unread"
fn summary(app: &App) -> String {
    let count = app.router.len();
    let mut stats = format!(
        " | {} session{} | {}",
        count,
        if count == 1 { "" } else { "s" },
        app.router.total_cost().format()
    );

    let working = app.router.working_count();
    if working > 0 {
        stats.push_str(&format!(" | {working} working"));
    }
    let queued = app.router.queued_total();
    if queued > 0 {
        stats.push_str(&format!(" | {queued} queued"));
    }
    let unread = app.router.unread_count();
    if unread > 0 {
        stats.push_str(&format!(" | {unread} unread"));
    }
    stats
}

/// Renders the footer with the notification, or keybinding hints.
pub fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let line = match app.notification() {
        Some(note) => notification_line(note),
        None => hints_line(),
    };

    let footer = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    frame.render_widget(footer, area);
}

fn notification_line(note: &Notification) -> Line<'static> {
    let color = if note.is_error() { Color::Red } else { Color::Green };
    Line::from(Span::styled(
        format!(" {}", note.message),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
}

fn hints_line() -> Line<'static> {
    let key_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let sep_style = Style::default().fg(Color::DarkGray);

    let hints = [
        ("Tab", "switch"),
        ("^N", "new"),
        ("^W", "retire"),
        ("PgUp/PgDn", "scroll"),
        ("Enter", "send"),
        ("^Q", "quit"),
    ];

    let mut spans = vec![Span::raw(" ")];
    for (i, (key, label)) in hints.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled("  |  ", sep_style));
        }
        spans.push(Span::styled(*key, key_style));
        spans.push(Span::raw(format!(" {label}")));
    }
    Line::from(spans)
}
