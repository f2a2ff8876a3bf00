//! Progress bar for batch downloads.

use std::io::{self, IsTerminal};
use std::time::Duration;

use harvester_core::ProgressReporter;
use indicatif::{ProgressBar, ProgressStyle};

pub(crate) struct BatchProgress {
    bar: ProgressBar,
}

impl BatchProgress {
    /// A visible bar on an interactive stderr unless `quiet`; hidden otherwise.
    pub(crate) fn new(quiet: bool) -> Self {
        if quiet || !io::stderr().is_terminal() {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] {wide_bar} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressReporter for BatchProgress {
    fn on_progress(&self, processed: usize, total: usize, downloaded: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(processed as u64);
        self.bar.set_message(format!("{downloaded} downloaded"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_progress_is_hidden_and_accepts_updates() {
        let progress = BatchProgress::new(true);
        assert!(progress.bar.is_hidden());
        progress.on_progress(1, 2, 1);
        assert_eq!(progress.bar.position(), 1);
        assert_eq!(progress.bar.length(), Some(2));
        progress.finish();
    }
}
