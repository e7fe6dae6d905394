//! Shared theme utilities for the conductor TUI.
//!
//! Provides consistent styling across all UI components.

use conductor_core::ProcessStatus;
use ratatui::style::Color;

/// Returns the color for a process status.
///
/// - Blue: working
/// - Green: ready
/// - Yellow: pending/starting/retiring (transitional)
/// - Red: failed
/// - DarkGray: paused/stopped/retired
pub fn status_color(status: ProcessStatus) -> Color {
    match status {
        ProcessStatus::Working => Color::Blue,
        ProcessStatus::Ready => Color::Green,
        ProcessStatus::Pending | ProcessStatus::Starting | ProcessStatus::Retiring => {
            Color::Yellow
        }
        ProcessStatus::Failed => Color::Red,
        ProcessStatus::Paused | ProcessStatus::Stopped | ProcessStatus::Retired => {
            Color::DarkGray
        }
    }
}

/// Returns the status icon, substituting the spinner while loading.
pub fn status_icon(status: ProcessStatus, spinner: &'static str) -> &'static str {
    if status.is_loading() {
        spinner
    } else {
        status.icon()
    }
}

/// Returns the color for context usage display.
///
/// Traffic-light coding: green below 50%, yellow below 90%, red above.
pub fn context_color(percentage: f64) -> Color {
    if percentage >= 90.0 {
        Color::Red
    } else if percentage >= 50.0 {
        Color::Yellow
    } else {
        Color::Green
    }
}
