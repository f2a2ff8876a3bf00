//! Progress reporting for batch downloads.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::warn;

/// Receives `(processed, total, downloaded_so_far)` after each DOI.
pub trait ProgressReporter {
    fn on_progress(&self, processed: usize, total: usize, downloaded: usize);
}

impl<F> ProgressReporter for F
where
    F: Fn(usize, usize, usize),
{
    fn on_progress(&self, processed: usize, total: usize, downloaded: usize) {
        self(processed, total, downloaded);
    }
}

/// Invokes the reporter, swallowing a panic so the batch keeps going.
pub(crate) fn notify(
    reporter: Option<&dyn ProgressReporter>,
    processed: usize,
    total: usize,
    downloaded: usize,
) {
    let Some(reporter) = reporter else {
        return;
    };
    if catch_unwind(AssertUnwindSafe(|| {
        reporter.on_progress(processed, total, downloaded);
    }))
    .is_err()
    {
        warn!(processed, total, "progress reporter panicked; ignoring");
    }
}
