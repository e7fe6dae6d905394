//! Mouse-driven text selection over plain transcript lines.
//!
//! Positions are `(line, display column)` pairs in content space. Columns
//! count terminal cells, so an emoji or a CJK character occupies two
//! columns and a combining mark none. Extraction works on whole grapheme
//! clusters: a cluster is part of the selection iff the column it starts at
//! lies inside the selected range.
//!
//! A selection is undirected while dragging. [`TextSelection::bounds`]
//! always returns the normalized `(min, max)` pair.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

// ============================================================================
// Point
// ============================================================================

/// A content-space position. Orders by line, then column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Point {
    pub line: usize,
    pub col: usize,
}

impl Point {
    pub const fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

// ============================================================================
// Selection State
// ============================================================================

/// Selection driven by press, drag, and release.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextSelection {
    start: Option<Point>,
    end: Option<Point>,
    selecting: bool,
}

impl TextSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchors a new selection at `point` (pointer press).
    pub fn start(&mut self, point: Point) {
        self.start = Some(point);
        self.end = Some(point);
        self.selecting = true;
    }

    /// Moves the free end of the selection (pointer drag).
    ///
    /// Returns true if the selection changed. Ignored when no drag is in
    /// progress.
    pub fn update(&mut self, point: Point) -> bool {
        if !self.selecting || self.end == Some(point) {
            return false;
        }
        self.end = Some(point);
        true
    }

    /// Ends the drag (pointer release), extracts the text, and clears.
    ///
    /// Returns `None` for an empty selection: press and release at the
    /// same point, or a range covering no characters.
    pub fn finalize(&mut self, lines: &[String]) -> Option<String> {
        let bounds = self.bounds();
        self.clear();

        let (start, end) = bounds?;
        if start == end {
            return None;
        }

        let text = extract(lines, start, end);
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Drops the selection.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Returns true while the pointer button is held.
    pub fn is_selecting(&self) -> bool {
        self.selecting
    }

    /// Returns true if any range is anchored, even a zero-width one.
    pub fn is_active(&self) -> bool {
        self.start.is_some()
    }

    /// Returns the normalized `(min, max)` bounds.
    pub fn bounds(&self) -> Option<(Point, Point)> {
        let (a, b) = (self.start?, self.end?);
        Some(if a <= b { (a, b) } else { (b, a) })
    }

    /// Returns the currently selected text, or an empty string.
    pub fn selected_text(&self, lines: &[String]) -> String {
        match self.bounds() {
            Some((start, end)) => extract(lines, start, end),
            None => String::new(),
        }
    }

    /// Returns the selected column range `[start, end)` on `line`, if any.
    ///
    /// `line_width` is the display width of that line; the range is clamped
    /// to it.
    pub fn columns_on_line(&self, line: usize, line_width: usize) -> Option<(usize, usize)> {
        let (start, end) = self.bounds()?;
        if line < start.line || line > end.line {
            return None;
        }
        let from = if line == start.line { start.col } else { 0 };
        let to = if line == end.line { end.col } else { line_width };
        let to = to.min(line_width);
        (from < to).then_some((from, to))
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Extracts text between two normalized points.
///
/// Lines and columns past the end of the content are clamped: an end point
/// beyond the last line selects through the end of the last line.
fn extract(lines: &[String], start: Point, end: Point) -> String {
    let Some(last) = lines.len().checked_sub(1) else {
        return String::new();
    };

    let end = if end.line > last {
        Point::new(last, usize::MAX)
    } else {
        end
    };
    if start.line > last {
        return String::new();
    }

    if start.line == end.line {
        let line = lines.get(start.line).map(String::as_str).unwrap_or("");
        return slice_columns(line, start.col, end.col);
    }

    let mut out = String::new();
    for (index, line) in lines
        .iter()
        .enumerate()
        .take(end.line + 1)
        .skip(start.line)
    {
        if index == start.line {
            out.push_str(&slice_columns(line, start.col, usize::MAX));
        } else if index == end.line {
            out.push('\n');
            out.push_str(&slice_columns(line, 0, end.col));
        } else {
            out.push('\n');
            out.push_str(line);
        }
    }
    out
}

/// Returns the grapheme clusters of `line` whose starting display column is
/// in `[start, end)`.
pub fn slice_columns(line: &str, start: usize, end: usize) -> String {
    if start >= end {
        return String::new();
    }

    let mut out = String::new();
    let mut col = 0usize;
    for grapheme in line.graphemes(true) {
        if col >= end {
            break;
        }
        if col >= start {
            out.push_str(grapheme);
        }
        col += grapheme.width();
    }
    out
}

/// Display width of a plain line.
pub fn display_width(line: &str) -> usize {
    line.width()
}
