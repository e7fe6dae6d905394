//! Message layout: wrapping by display width and per-line styling.
//!
//! Each message becomes a label line, its wrapped content lines, and one
//! spacer line. The plain text of every line is kept separately from its
//! styling so selection can slice exactly what is on screen.

use conductor_core::{ChatMessage, MessageKind, MessageRole};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::config::RenderConfig;

// ============================================================================
// Line Metadata
// ============================================================================

/// Which part of a message a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinePart {
    Label,
    Body { first: bool },
    Spacer,
}

/// Everything needed to style a plain line without the message at hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineMeta {
    pub role: MessageRole,
    pub kind: MessageKind,
    pub part: LinePart,
}

// ============================================================================
// Wrapping
// ============================================================================

/// Wraps `text` to at most `width` display columns per line.
///
/// Breaks after whitespace when possible and inside a word otherwise.
/// Whitespace at a wrap point is dropped. A width of 0 disables wrapping.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 || text.width() <= width {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0usize;
    // Byte offset just past the last whitespace in `current`, and the
    // display width up to that offset.
    let mut break_at: Option<(usize, usize)> = None;

    for grapheme in text.graphemes(true) {
        let w = grapheme.width();
        let is_space = grapheme.chars().all(char::is_whitespace);

        if current_width + w > width && !current.is_empty() {
            match break_at.take() {
                Some((byte, break_width)) if !is_space => {
                    let rest = current.split_off(byte);
                    lines.push(current.trim_end().to_string());
                    current = rest;
                    current_width = current_width.saturating_sub(break_width);
                }
                _ => {
                    lines.push(current.trim_end().to_string());
                    current.clear();
                    current_width = 0;
                }
            }
            if is_space {
                continue;
            }
        }

        if is_space && current.is_empty() && !lines.is_empty() {
            continue;
        }

        current.push_str(grapheme);
        current_width += w;
        if is_space {
            break_at = Some((current.len(), current_width));
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Lays out one message, appending its plain lines and metadata.
///
/// Returns the number of lines added.
pub fn layout_message(
    message: &ChatMessage,
    width: usize,
    config: &RenderConfig,
    text: &mut Vec<String>,
    meta: &mut Vec<LineMeta>,
) -> usize {
    let before = text.len();
    let line_meta = |part| LineMeta {
        role: message.role,
        kind: message.kind,
        part,
    };

    text.push(config.attribution(message.role).label.clone());
    meta.push(line_meta(LinePart::Label));

    let (first_prefix, rest_prefix) = match message.kind {
        MessageKind::Text => (String::new(), String::new()),
        MessageKind::ToolCall => {
            let marker = config.tool_marker.clone();
            let indent = " ".repeat(marker.width());
            (marker, indent)
        }
    };
    let body_width = width.saturating_sub(first_prefix.width());
    let body_width = if width == 0 { 0 } else { body_width.max(1) };

    let mut first = true;
    for paragraph in message.content.split('\n') {
        for wrapped in wrap_text(paragraph, body_width) {
            let prefix = if first { &first_prefix } else { &rest_prefix };
            text.push(format!("{prefix}{wrapped}"));
            meta.push(line_meta(LinePart::Body { first }));
            first = false;
        }
    }

    text.push(String::new());
    meta.push(line_meta(LinePart::Spacer));

    text.len() - before
}

// ============================================================================
// Styling
// ============================================================================

/// Renders one plain line with the style its metadata calls for.
pub fn style_line(text: &str, meta: LineMeta, config: &RenderConfig) -> Line<'static> {
    match meta.part {
        LinePart::Spacer => Line::default(),
        LinePart::Label => Line::from(Span::styled(
            text.to_string(),
            Style::default()
                .fg(config.attribution(meta.role).color)
                .add_modifier(Modifier::BOLD),
        )),
        LinePart::Body { first } => match meta.kind {
            MessageKind::ToolCall => {
                let dim = Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::DIM);
                match text.strip_prefix(config.tool_marker.as_str()) {
                    Some(rest) if first => Line::from(vec![
                        Span::styled(
                            config.tool_marker.clone(),
                            Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD),
                        ),
                        Span::styled(rest.to_string(), dim),
                    ]),
                    _ => Line::from(Span::styled(text.to_string(), dim)),
                }
            }
            MessageKind::Text => match meta.role {
                MessageRole::System => Line::from(Span::styled(
                    text.to_string(),
                    Style::default()
                        .fg(config.system.color)
                        .add_modifier(Modifier::ITALIC),
                )),
                MessageRole::Agent | MessageRole::User => Line::from(text.to_string()),
            },
        },
    }
}

/// Returns `line` with the columns `[start, end)` shown reversed.
///
/// Grapheme clusters are kept whole, using the same starting-column rule as
/// selection extraction.
pub fn highlight_columns(line: &Line<'static>, start: usize, end: usize) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut col = 0usize;

    for span in &line.spans {
        let mut segment = String::new();
        let mut segment_selected = false;

        for grapheme in span.content.graphemes(true) {
            let selected = col >= start && col < end;
            if selected != segment_selected && !segment.is_empty() {
                spans.push(selection_span(&segment, span.style, segment_selected));
                segment.clear();
            }
            segment_selected = selected;
            segment.push_str(grapheme);
            col += grapheme.width();
        }

        if !segment.is_empty() {
            spans.push(selection_span(&segment, span.style, segment_selected));
        }
    }

    Line::from(spans).style(line.style)
}

fn selection_span(text: &str, style: Style, selected: bool) -> Span<'static> {
    let style = if selected {
        style.add_modifier(Modifier::REVERSED)
    } else {
        style
    };
    Span::styled(text.to_string(), style)
}
