//! Anonymized usage events.
//!
//! Events carry the query, its parameters and aggregate counts only. No
//! network identity is recorded; a session is a random hash. Sinks never
//! fail the caller: a sink that cannot be opened is replaced by
//! [`NoopUsageSink`], and write failures are logged and dropped.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::download::BatchStats;
use crate::search::{AccessFilter, SearchParams, SearchType, WorkRecord};

/// Longest query text kept in an event.
const MAX_QUERY_CHARS: usize = 500;
/// Hex characters kept from the session hash.
const SESSION_ID_LEN: usize = 16;

/// Search parameters as recorded (the query text is stored separately).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageParams {
    pub search_type: SearchType,
    pub max_results: usize,
    pub access: AccessFilter,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub sort: &'static str,
}

/// Aggregates over the returned rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultAggregates {
    pub total: usize,
    pub with_abstract: usize,
    pub open_access: usize,
    /// Mean citation count rounded to two decimals; 0 for no rows.
    pub avg_citations: f64,
}

/// Aggregates over a PDF batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PdfAggregates {
    pub total: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub no_pdf: usize,
}

impl From<&BatchStats> for PdfAggregates {
    fn from(stats: &BatchStats) -> Self {
        Self {
            total: stats.total,
            downloaded: stats.downloaded,
            failed: stats.failed,
            no_pdf: stats.no_pdf,
        }
    }
}

/// One search (and optional download batch) as recorded by a sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageEvent {
    /// RFC 7231 date of the event.
    pub timestamp: String,
    pub session_id: String,
    pub query: String,
    pub params: UsageParams,
    pub results: ResultAggregates,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf: Option<PdfAggregates>,
}

impl UsageEvent {
    /// Summarizes a search and, when given, the batch that followed it.
    #[must_use]
    pub fn for_search(
        session_id: &str,
        params: &SearchParams,
        rows: &[WorkRecord],
        batch: Option<&BatchStats>,
    ) -> Self {
        Self {
            timestamp: httpdate::fmt_http_date(SystemTime::now()),
            session_id: session_id.to_string(),
            query: params.query.chars().take(MAX_QUERY_CHARS).collect(),
            params: UsageParams {
                search_type: params.search_type,
                max_results: params.max_results,
                access: params.access,
                year_from: params.year_from,
                year_to: params.year_to,
                sort: params.sort.as_param(),
            },
            results: aggregate(rows),
            pdf: batch.map(PdfAggregates::from),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn aggregate(rows: &[WorkRecord]) -> ResultAggregates {
    let total = rows.len();
    let avg_citations = if total == 0 {
        0.0
    } else {
        let sum: u64 = rows.iter().map(|r| r.citation_count).sum();
        (sum as f64 / total as f64 * 100.0).round() / 100.0
    };
    ResultAggregates {
        total,
        with_abstract: rows.iter().filter(|r| !r.abstract_text.is_empty()).count(),
        open_access: rows.iter().filter(|r| r.is_open_access).count(),
        avg_citations,
    }
}

/// Anonymous session id: 16 hex chars of SHA-256 over 32 random bytes.
#[must_use]
pub fn new_session_id() -> String {
    let mut seed = [0_u8; 32];
    rand::thread_rng().fill(&mut seed);
    let digest = Sha256::digest(seed);
    digest
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<String>()
        .chars()
        .take(SESSION_ID_LEN)
        .collect()
}

/// Destination for usage events.
pub trait UsageSink: Send + Sync {
    fn record(&self, event: &UsageEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUsageSink;

impl UsageSink for NoopUsageSink {
    fn record(&self, _event: &UsageEvent) {}
}

/// Appends one JSON object per line to a local file.
#[derive(Debug)]
pub struct JsonLinesUsageSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesUsageSink {
    /// Opens (or creates) `path` for appending.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from creating the parent directory or the file.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UsageSink for JsonLinesUsageSink {
    fn record(&self, event: &UsageEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(error) => {
                warn!(error = %error, "could not serialize usage event");
                return;
            }
        };
        let Ok(mut file) = self.file.lock() else {
            warn!("usage log lock poisoned; dropping event");
            return;
        };
        if let Err(error) = writeln!(file, "{line}") {
            warn!(path = %self.path.display(), error = %error, "could not write usage event");
        }
    }
}

/// Builds the sink for an optional log path, downgrading to no-op when the
/// file cannot be opened.
#[must_use]
pub fn usage_sink_from_path(path: Option<&Path>) -> Arc<dyn UsageSink> {
    let Some(path) = path else {
        return Arc::new(NoopUsageSink);
    };
    match JsonLinesUsageSink::open(path) {
        Ok(sink) => {
            debug!(path = %path.display(), "usage log enabled");
            Arc::new(sink)
        }
        Err(error) => {
            debug!(path = %path.display(), error = %error, "usage log unavailable, disabled");
            Arc::new(NoopUsageSink)
        }
    }
}
