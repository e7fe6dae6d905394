//! Clipboard access for copying selected transcript text.
//!
//! The app only sees the [`Clipboard`] trait, so tests can substitute a
//! recording or failing implementation and headless runs can go without one.

use thiserror::Error;

/// Clipboard operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipboardError {
    /// No system clipboard could be opened (no display server, etc).
    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),

    /// The clipboard refused the text.
    #[error("Clipboard write failed: {0}")]
    Write(String),
}

/// Something that can receive copied text.
pub trait Clipboard {
    /// Copies `text`, replacing the clipboard contents.
    fn copy(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// The system clipboard via `arboard`.
///
/// The handle is opened on first use and kept afterwards; on X11 the
/// contents only survive while the handle is alive.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clipboard for SystemClipboard {
    fn copy(&mut self, text: &str) -> Result<(), ClipboardError> {
        if self.inner.is_none() {
            let clipboard =
                arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
            self.inner = Some(clipboard);
        }

        let Some(clipboard) = self.inner.as_mut() else {
            return Err(ClipboardError::Unavailable("not initialized".to_string()));
        };

        clipboard
            .set_text(text)
            .map_err(|e| ClipboardError::Write(e.to_string()))
    }
}

impl std::fmt::Debug for SystemClipboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemClipboard")
            .field("open", &self.inner.is_some())
            .finish()
    }
}
