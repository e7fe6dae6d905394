//! Transcript panel for the active session.
//!
//! The panel body is whatever the session's [`VirtualPane`] produces for its
//! current viewport; this module only adds the border and titles.
//!
//! [`VirtualPane`]: crate::pane::VirtualPane

use crate::app::App;
use crate::session::Session;
use crate::ui::theme::{context_color, status_color};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Renders the active session's transcript.
pub fn render_transcript(frame: &mut Frame, area: Rect, app: &mut App) {
    let can_retry = app.can_retry();
    let Some(session) = app.router.active_session_mut() else {
        frame.render_widget(Block::default().borders(Borders::ALL), area);
        return;
    };

    let mut block = Block::default()
        .borders(Borders::ALL)
        .title(title_line(session))
        .border_style(Style::default().fg(status_color(session.status)));
    if let Some(bottom) = bottom_line(session, can_retry) {
        block = block.title_bottom(bottom);
    }

    let lines = session.pane.view();
    session.content_dirty = false;

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// " worker-2 | working | phase: plan | 12K in / 3K out (40%) "
fn title_line(session: &Session) -> Line<'static> {
    let sep = Span::styled(" | ", Style::default().fg(Color::DarkGray));
    let mut spans = vec![
        Span::raw(" "),
        Span::styled(
            session.display_name(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        sep.clone(),
        Span::styled(
            session.status.label(),
            Style::default().fg(status_color(session.status)),
        ),
    ];

    if let Some(phase) = &session.phase {
        spans.push(sep.clone());
        spans.push(Span::styled(
            format!("phase: {phase}"),
            Style::default().fg(Color::Magenta),
        ));
    }
    if let Some(metrics) = &session.metrics {
        spans.push(sep);
        spans.push(Span::styled(
            metrics.format_compact(),
            Style::default().fg(context_color(metrics.usage_percentage())),
        ));
    }
    spans.push(Span::raw(" "));
    Line::from(spans)
}

/// Error detail and retry hint, or the scroll position when scrolled up.
fn bottom_line(session: &Session, can_retry: bool) -> Option<Line<'static>> {
    if let Some(error) = &session.last_error {
        let mut spans = vec![Span::styled(
            format!(" {error} "),
            Style::default().fg(Color::Red),
        )];
        if can_retry {
            spans.push(Span::styled(
                " Ctrl+R retry ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ));
        }
        return Some(Line::from(spans));
    }

    if session.pane.at_bottom() {
        return None;
    }
    let position = format!(
        " {}/{} ",
        session.pane.scroll_offset() + session.pane.height(),
        session.pane.total_lines()
    );
    Some(Line::from(Span::styled(
        position,
        Style::default().fg(Color::DarkGray),
    )))
}
