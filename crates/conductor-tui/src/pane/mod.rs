//! Virtualized transcript pane.
//!
//! A pane owns the laid-out plain text of its messages, one metadata entry
//! per line, and a [`LineCache`] of styled lines. [`VirtualPane::view`]
//! styles only the lines inside the viewport, so a frame costs
//! O(height + prewarm buffer) no matter how long the transcript gets.
//!
//! Scroll offsets count lines from the top of the content. The pane keeps
//! three rules:
//! - `scroll_offset` is always within `[0, max_scroll_offset]`
//! - a pane at the bottom stays pinned to the bottom as content arrives
//! - content shorter than the viewport is padded at the top so it hugs the
//!   bottom edge
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

mod cache;
mod wrap;

use conductor_core::ChatMessage;
use crossterm::event::{MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::{Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::config::{PaneConfig, RenderConfig};
use crate::selection::{display_width, Point, TextSelection};

pub use cache::LineCache;
pub use wrap::{highlight_columns, layout_message, style_line, wrap_text, LineMeta, LinePart};

/// Cells taken by the border on each side of the pane.
pub const BORDER_INSET: u16 = 1;

/// Shown when a pane has no messages.
pub const PLACEHOLDER: &str = "No messages yet";

/// What a mouse event did to the pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaneMouseOutcome {
    /// The event was outside the pane or not relevant to it.
    Ignored,
    /// The viewport moved.
    Scrolled,
    /// A selection was started or extended.
    Selecting,
    /// The pointer was released over a non-empty selection.
    Selected(String),
    /// The pointer was released without selecting anything.
    Cleared,
}

// ============================================================================
// Virtual Pane
// ============================================================================

#[derive(Debug)]
pub struct VirtualPane {
    messages: Vec<ChatMessage>,
    /// First line index of each message.
    message_starts: Vec<usize>,
    /// Plain text per line, in lockstep with `meta`.
    lines: Vec<String>,
    meta: Vec<LineMeta>,
    cache: LineCache,
    config: PaneConfig,
    /// Outer screen area, border included.
    area: Rect,
    width: usize,
    height: usize,
    scroll_offset: usize,
    selection: TextSelection,
}

impl VirtualPane {
    pub fn new(config: PaneConfig) -> Self {
        Self {
            messages: Vec::new(),
            message_starts: Vec::new(),
            lines: Vec::new(),
            meta: Vec::new(),
            cache: LineCache::new(),
            config,
            area: Rect::default(),
            width: 0,
            height: 0,
            scroll_offset: 0,
            selection: TextSelection::new(),
        }
    }

    // ========================================================================
    // Content
    // ========================================================================

    /// Replaces all content, re-wrapping at `width`.
    pub fn set_content(&mut self, messages: &[ChatMessage], width: usize, render: RenderConfig) {
        let pinned = self.at_bottom();
        self.config.render = render;
        self.width = width;
        self.messages = messages.to_vec();
        self.relayout();
        self.settle(pinned);
    }

    /// Appends one message. Returns the index of its first line.
    pub fn append_message(&mut self, message: ChatMessage) -> usize {
        let pinned = self.at_bottom();
        let start = self.lines.len();
        self.push_layout(&message);
        self.messages.push(message);
        self.cache.resize(self.lines.len());
        self.settle(pinned);
        start
    }

    /// Replaces the most recent message, e.g. after a streaming delta.
    ///
    /// Only that message's lines are re-wrapped; every earlier cached line
    /// stays warm. Appends if there is no message yet.
    pub fn replace_last_message(&mut self, message: ChatMessage) -> usize {
        let Some(&start) = self.message_starts.last() else {
            return self.append_message(message);
        };

        let pinned = self.at_bottom();
        if let Some(last) = self.messages.last_mut() {
            *last = message.clone();
        }
        self.message_starts.pop();
        self.lines.truncate(start);
        self.meta.truncate(start);
        self.cache.resize(start);
        self.push_layout(&message);
        self.cache.resize(self.lines.len());
        self.settle(pinned);
        start
    }

    fn push_layout(&mut self, message: &ChatMessage) {
        self.message_starts.push(self.lines.len());
        layout_message(
            message,
            self.width,
            &self.config.render,
            &mut self.lines,
            &mut self.meta,
        );
    }

    fn relayout(&mut self) {
        self.lines.clear();
        self.meta.clear();
        self.message_starts.clear();
        let messages = std::mem::take(&mut self.messages);
        for message in &messages {
            self.push_layout(message);
        }
        self.messages = messages;
        self.cache.reset(self.lines.len());
        self.selection.clear();
    }

    /// Pins to the bottom if `pinned`, otherwise re-clamps the offset.
    fn settle(&mut self, pinned: bool) {
        if pinned {
            self.scroll_offset = self.max_scroll_offset();
        } else {
            self.scroll_offset = self.scroll_offset.min(self.max_scroll_offset());
        }
    }

    // ========================================================================
    // Geometry
    // ========================================================================

    /// Sets the inner size. A width change re-wraps everything; a height
    /// change only re-clamps.
    pub fn set_size(&mut self, width: usize, height: usize) {
        let pinned = self.at_bottom();
        self.height = height;
        if width != self.width {
            self.width = width;
            self.relayout();
        }
        self.settle(pinned);
    }

    /// Places the pane on screen. `area` includes the border.
    pub fn set_area(&mut self, area: Rect) {
        self.area = area;
        let inset = BORDER_INSET.saturating_mul(2);
        self.set_size(
            usize::from(area.width.saturating_sub(inset)),
            usize::from(area.height.saturating_sub(inset)),
        );
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn total_lines(&self) -> usize {
        self.lines.len()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Plain text of every line, for selection extraction.
    pub fn plain_lines(&self) -> &[String] {
        &self.lines
    }

    /// Blank lines above the content when it is shorter than the viewport.
    pub fn top_padding(&self) -> usize {
        self.height.saturating_sub(self.lines.len())
    }

    // ========================================================================
    // Scrolling
    // ========================================================================

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn max_scroll_offset(&self) -> usize {
        self.lines.len().saturating_sub(self.height)
    }

    pub fn at_top(&self) -> bool {
        self.scroll_offset == 0
    }

    pub fn at_bottom(&self) -> bool {
        self.scroll_offset >= self.max_scroll_offset()
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
        self.prewarm();
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self
            .scroll_offset
            .saturating_add(lines)
            .min(self.max_scroll_offset());
        self.prewarm();
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll_offset = 0;
        self.prewarm();
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = self.max_scroll_offset();
        self.prewarm();
    }

    /// Scrolls by one viewport height, keeping one line of context.
    pub fn page_up(&mut self) {
        self.scroll_up(self.height.saturating_sub(1).max(1));
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.height.saturating_sub(1).max(1));
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Styles the lines just outside the viewport so small scrolls hit a
    /// warm cache.
    pub fn prewarm(&mut self) {
        let buffer = self.config.prewarm_buffer;
        let total = self.lines.len();
        let above = self.scroll_offset.saturating_sub(buffer)..self.scroll_offset;
        let below_start = self.scroll_offset.saturating_add(self.height).min(total);
        let below = below_start..below_start.saturating_add(buffer).min(total);
        for index in above.chain(below) {
            self.render_line(index);
        }
    }

    fn render_line(&mut self, index: usize) -> Option<&Line<'static>> {
        let Self {
            cache,
            lines,
            meta,
            config,
            ..
        } = self;
        let text = lines.get(index)?;
        let line_meta = *meta.get(index)?;
        cache.get_or_insert_with(index, || style_line(text, line_meta, &config.render))
    }

    /// Returns exactly `height` lines for the current viewport.
    pub fn view(&mut self) -> Vec<Line<'static>> {
        let height = self.height;
        if height == 0 {
            return Vec::new();
        }

        if self.lines.is_empty() {
            let mut out = vec![Line::default(); height - 1];
            out.push(Line::from(Span::styled(
                PLACEHOLDER,
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            )));
            return out;
        }

        let padding = self.top_padding();
        let mut out = Vec::with_capacity(height);
        out.resize(padding, Line::default());

        let first = self.scroll_offset;
        let last = first.saturating_add(height - padding).min(self.lines.len());
        for index in first..last {
            let styled = self.render_line(index).cloned().unwrap_or_default();
            let width = self.lines.get(index).map(|l| display_width(l)).unwrap_or(0);
            let line = match self.selection.columns_on_line(index, width) {
                Some((from, to)) => highlight_columns(&styled, from, to),
                None => styled,
            };
            out.push(line);
        }

        out.resize(height, Line::default());
        out
    }

    /// Number of lines currently held in the style cache.
    pub fn cached_lines(&self) -> usize {
        self.cache.filled()
    }

    // ========================================================================
    // Mouse & Selection
    // ========================================================================

    pub fn selection(&self) -> &TextSelection {
        &self.selection
    }

    /// Maps a screen cell to a content point, clamped to valid lines and
    /// columns. Returns `None` when there is no content.
    pub fn screen_to_content(&self, column: u16, row: u16) -> Option<Point> {
        let last = self.lines.len().checked_sub(1)?;

        let row = usize::from(row.saturating_sub(self.area.y));
        let row = row.saturating_sub(usize::from(BORDER_INSET));
        let row = row.saturating_sub(self.top_padding());
        let line = row.saturating_add(self.scroll_offset).min(last);

        let col = usize::from(column.saturating_sub(self.area.x));
        let col = col.saturating_sub(usize::from(BORDER_INSET));
        let width = self.lines.get(line).map(|l| display_width(l)).unwrap_or(0);

        Some(Point::new(line, col.min(width)))
    }

    /// Handles wheel scrolling and left-button selection.
    pub fn handle_mouse(&mut self, event: MouseEvent) -> PaneMouseOutcome {
        let inside = self.area.contains(Position::new(event.column, event.row));

        match event.kind {
            MouseEventKind::ScrollUp if inside => {
                self.scroll_up(self.config.scroll_step);
                PaneMouseOutcome::Scrolled
            }
            MouseEventKind::ScrollDown if inside => {
                self.scroll_down(self.config.scroll_step);
                PaneMouseOutcome::Scrolled
            }
            MouseEventKind::Down(MouseButton::Left) if inside => {
                match self.screen_to_content(event.column, event.row) {
                    Some(point) => {
                        self.selection.start(point);
                        PaneMouseOutcome::Selecting
                    }
                    None => {
                        self.selection.clear();
                        PaneMouseOutcome::Ignored
                    }
                }
            }
            MouseEventKind::Drag(MouseButton::Left) if self.selection.is_selecting() => {
                match self.screen_to_content(event.column, event.row) {
                    Some(point) if self.selection.update(point) => PaneMouseOutcome::Selecting,
                    _ => PaneMouseOutcome::Ignored,
                }
            }
            MouseEventKind::Up(MouseButton::Left) if self.selection.is_selecting() => {
                match self.selection.finalize(&self.lines) {
                    Some(text) => PaneMouseOutcome::Selected(text),
                    None => PaneMouseOutcome::Cleared,
                }
            }
            _ => PaneMouseOutcome::Ignored,
        }
    }

    /// Drops any selection.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }
}

impl Default for VirtualPane {
    fn default() -> Self {
        Self::new(PaneConfig::default())
    }
}
