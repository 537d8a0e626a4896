//! Progress reporting
//!
//! The pipeline reports its phase and per-step progress through [`Ui`]:
//! - [`ConsoleUi`] draws indicatif progress bars on stderr
//! - [`SilentUi`] discards everything (tests, `--quiet`, `--json`)
//!
//! Log lines go through `tracing` independently of the UI.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// Pipeline phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    InitializingSchema,
    Downloading,
    Extracting,
    Truncating,
    Loading,
    Complete,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Connecting => write!(f, "Connecting to database"),
            Phase::InitializingSchema => write!(f, "Initializing schema"),
            Phase::Downloading => write!(f, "Downloading registry"),
            Phase::Extracting => write!(f, "Extracting files"),
            Phase::Truncating => write!(f, "Clearing tables"),
            Phase::Loading => write!(f, "Loading tables"),
            Phase::Complete => write!(f, "Complete"),
        }
    }
}

/// Trait for UI implementations - allows both console and silent/test modes
pub trait Ui {
    fn set_phase(&mut self, phase: Phase);
    /// `total == 0` means the total is unknown
    fn set_progress(&mut self, current: u64, total: u64, label: &str);
    fn clear_progress(&mut self);
}

const BAR_TEMPLATE: &str = "{msg:30} [{bar:40.cyan/blue}] {pos}/{len}";
const SPINNER_TEMPLATE: &str = "{spinner} {msg:30} {pos}";

/// Console UI drawing one progress bar at a time
#[derive(Default)]
pub struct ConsoleUi {
    bar: Option<ProgressBar>,
}

impl ConsoleUi {
    pub fn new() -> Self {
        Self::default()
    }

    fn bar(&mut self, total: u64) -> &ProgressBar {
        self.bar.get_or_insert_with(|| {
            let (bar, template) = if total > 0 {
                (ProgressBar::new(total), BAR_TEMPLATE)
            } else {
                (ProgressBar::new_spinner(), SPINNER_TEMPLATE)
            };
            let style = ProgressStyle::with_template(template)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-");
            bar.set_style(style);
            bar
        })
    }
}

impl Ui for ConsoleUi {
    fn set_phase(&mut self, phase: Phase) {
        self.clear_progress();
        info!(phase = %phase, "Phase started");
    }

    fn set_progress(&mut self, current: u64, total: u64, label: &str) {
        let bar = self.bar(total);
        if total > 0 {
            bar.set_length(total);
        }
        bar.set_position(current);
        bar.set_message(label.to_string());
    }

    fn clear_progress(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl Drop for ConsoleUi {
    fn drop(&mut self) {
        self.clear_progress();
    }
}

/// Silent UI implementation for testing and non-interactive use
#[derive(Default)]
pub struct SilentUi;

impl SilentUi {
    pub fn new() -> Self {
        Self
    }
}

impl Ui for SilentUi {
    fn set_phase(&mut self, _phase: Phase) {}
    fn set_progress(&mut self, _current: u64, _total: u64, _label: &str) {}
    fn clear_progress(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Downloading.to_string(), "Downloading registry");
        assert_eq!(Phase::Complete.to_string(), "Complete");
    }

    #[test]
    fn test_console_ui_reuses_one_bar_until_cleared() {
        let mut ui = ConsoleUi::new();
        ui.set_progress(1, 10, "acftref");
        ui.set_progress(5, 10, "acftref");
        assert_eq!(ui.bar.as_ref().map(|b| b.position()), Some(5));

        ui.clear_progress();
        assert!(ui.bar.is_none());
    }
}
