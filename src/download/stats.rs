//! Per-DOI outcomes and batch aggregates.

use std::path::PathBuf;

use serde::Serialize;

use crate::resolve::ResolutionMethod;

/// What happened to one DOI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadOutcome {
    /// A verified PDF was written to `file_path`.
    Downloaded {
        url: String,
        method: ResolutionMethod,
        file_path: PathBuf,
    },
    /// A URL was found (or processing faulted) but nothing was saved.
    Failed { reason: String },
    /// No strategy produced a candidate that verified.
    NoPdfFound,
}

/// Outcome keyed by the DOI it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoiOutcome {
    pub doi: String,
    #[serde(flatten)]
    pub outcome: DownloadOutcome,
}

/// Aggregate counts for a batch run.
///
/// `downloaded + failed + no_pdf` always equals the number of recorded
/// outcomes, and equals `total` once the batch completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub no_pdf: usize,
    pub outcomes: Vec<DoiOutcome>,
    /// Human-readable messages for failures and non-fatal faults.
    pub errors: Vec<String>,
}

impl BatchStats {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Counts `outcome` in exactly one bucket and stores it.
    pub(crate) fn record(&mut self, doi: &str, outcome: DownloadOutcome) {
        match &outcome {
            DownloadOutcome::Downloaded { .. } => self.downloaded += 1,
            DownloadOutcome::Failed { .. } => self.failed += 1,
            DownloadOutcome::NoPdfFound => self.no_pdf += 1,
        }
        self.outcomes.push(DoiOutcome {
            doi: doi.to_string(),
            outcome,
        });
    }

    /// Number of DOIs handled so far.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    /// Paths of every file written in this batch.
    #[must_use]
    pub fn downloaded_files(&self) -> Vec<&PathBuf> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.outcome {
                DownloadOutcome::Downloaded { file_path, .. } => Some(file_path),
                _ => None,
            })
            .collect()
    }
}
