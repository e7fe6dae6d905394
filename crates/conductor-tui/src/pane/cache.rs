//! Slot arena of rendered lines, indexed by absolute line number.
//!
//! One slot per content line. A slot starts empty and is filled the first
//! time that line is rendered. Width changes empty every slot without
//! giving the allocation back; appends only add empty slots at the end.

use ratatui::text::Line;

#[derive(Debug, Default)]
pub struct LineCache {
    slots: Vec<Option<Line<'static>>>,
    filled: usize,
}

impl LineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots (equals the content line count).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots holding a rendered line.
    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn is_filled(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Some(_)))
    }

    /// Empties every slot and resizes to `len`.
    pub fn reset(&mut self, len: usize) {
        self.slots.clear();
        self.slots.resize(len, None);
        self.filled = 0;
    }

    /// Grows or shrinks to `len` slots, keeping rendered lines below `len`.
    pub fn resize(&mut self, len: usize) {
        if len < self.slots.len() {
            let dropped = self
                .slots
                .iter()
                .skip(len)
                .filter(|slot| slot.is_some())
                .count();
            self.filled = self.filled.saturating_sub(dropped);
        }
        self.slots.resize(len, None);
    }

    /// Returns the line at `index`, rendering it with `render` on a miss.
    ///
    /// Returns `None` only if `index` is out of range.
    pub fn get_or_insert_with<F>(&mut self, index: usize, render: F) -> Option<&Line<'static>>
    where
        F: FnOnce() -> Line<'static>,
    {
        let slot = self.slots.get_mut(index)?;
        if slot.is_none() {
            *slot = Some(render());
            self.filled += 1;
        }
        slot.as_ref()
    }
}
