//! Sequential batch downloader.
//!
//! [`BatchDownloader::download_all`] takes DOIs in input order, resolves each
//! one, re-verifies the resolved URL in streaming mode and streams the body
//! to the output directory. Per-DOI problems are recorded in [`BatchStats`];
//! only failing to create the output directory aborts a batch.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use harvester_core::{BatchDownloader, DoiResolver, HttpSession, Transport};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session: Arc<dyn Transport> = Arc::new(HttpSession::new()?);
//! let downloader = BatchDownloader::new(DoiResolver::new(session));
//! let dois = vec!["10.1234/abcd".to_string()];
//! let stats = downloader
//!     .download_all(&dois, Path::new("./pdfs"), None, None)
//!     .await?;
//! println!("{} of {} downloaded", stats.downloaded, stats.total);
//! # Ok(())
//! # }
//! ```

mod error;
mod filename;
mod progress;
mod stats;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use reqwest::header::CONTENT_DISPOSITION;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

pub use error::DownloadError;
pub use filename::{
    descriptive_filename, force_pdf_extension, parse_content_disposition, resolve_unique_path,
    sanitize_doi_for_filename, sanitize_server_filename, sanitize_text,
};
pub(crate) use filename::surname_of;
pub use progress::ProgressReporter;
pub use stats::{BatchStats, DoiOutcome, DownloadOutcome};

use progress::notify;

use crate::resolve::{DoiResolver, ResolutionTrace, ResolvedPdf};
use crate::search::WorkRecord;
use crate::transport::{FetchRequest, FetchResponse, PDF_ACCEPT};

/// Write buffer size for streamed bodies.
const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Caller-supplied naming data for one DOI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    /// Ordinal shown zero-padded at the start of the filename.
    pub index: usize,
    pub title: String,
    /// Author string; the first listed author's surname is used.
    pub author: String,
}

impl FileMetadata {
    /// Naming data for the `index`-th search row.
    #[must_use]
    pub fn from_record(index: usize, record: &WorkRecord) -> Self {
        Self {
            index,
            title: record.title.clone(),
            author: record.authors.first().cloned().unwrap_or_default(),
        }
    }
}

/// Resolves and downloads DOIs one at a time.
#[derive(Debug)]
pub struct BatchDownloader {
    resolver: DoiResolver,
}

impl BatchDownloader {
    #[must_use]
    pub fn new(resolver: DoiResolver) -> Self {
        Self { resolver }
    }

    #[must_use]
    pub fn resolver(&self) -> &DoiResolver {
        &self.resolver
    }

    /// Processes every DOI and returns the aggregate outcome.
    ///
    /// Blank entries are ignored and repeated DOIs are handled once, so
    /// `total` counts distinct DOIs. `progress` is called after each DOI.
    /// `metadata` keys match DOIs the same way: trimmed and case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] only when `output_dir` cannot be created.
    #[instrument(skip_all, fields(output_dir = %output_dir.display()))]
    pub async fn download_all(
        &self,
        dois: &[String],
        output_dir: &Path,
        progress: Option<&dyn ProgressReporter>,
        metadata: Option<&HashMap<String, FileMetadata>>,
    ) -> Result<BatchStats, DownloadError> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| DownloadError::io(output_dir, e))?;

        let dois = distinct_dois(dois);
        let metadata = metadata.map(index_metadata).unwrap_or_default();
        let mut stats = BatchStats::new(dois.len());
        info!(total = stats.total, "starting batch");

        for doi in &dois {
            let file_meta = metadata.get(&doi_key(doi)).copied();
            let outcome = self
                .process_doi(doi, output_dir, file_meta, &mut stats.errors)
                .await;
            stats.record(doi, outcome);
            notify(progress, stats.processed(), stats.total, stats.downloaded);
        }

        info!(
            total = stats.total,
            downloaded = stats.downloaded,
            failed = stats.failed,
            no_pdf = stats.no_pdf,
            "batch complete"
        );
        Ok(stats)
    }

    async fn process_doi(
        &self,
        doi: &str,
        output_dir: &Path,
        file_meta: Option<&FileMetadata>,
        errors: &mut Vec<String>,
    ) -> DownloadOutcome {
        let resolution = self.resolver.resolve(doi).await;
        self.save_trace(doi, &resolution.trace, errors).await;

        let Some(resolved) = resolution.outcome else {
            debug!(doi, "no PDF candidate verified");
            return DownloadOutcome::NoPdfFound;
        };

        match self.fetch_to_disk(doi, &resolved, output_dir, file_meta).await {
            Ok((url, file_path)) => {
                info!(doi, path = %file_path.display(), "saved PDF");
                DownloadOutcome::Downloaded {
                    url,
                    method: resolved.method,
                    file_path,
                }
            }
            Err(error) => {
                warn!(doi, error = %error, "download failed");
                let reason = error.to_string();
                errors.push(format!("{doi}: {reason}"));
                DownloadOutcome::Failed { reason }
            }
        }
    }

    async fn save_trace(&self, doi: &str, trace: &ResolutionTrace, errors: &mut Vec<String>) {
        let Some(dir) = self.resolver.diagnostics() else {
            return;
        };
        if let Err(error) = dir.save_trace(&sanitize_doi_for_filename(doi), trace).await {
            warn!(doi, error = %error, "could not save resolution log");
            errors.push(format!("{doi}: failed to save resolution log: {error}"));
        }
    }

    /// Re-verifies the resolved URL and streams it into `output_dir`.
    async fn fetch_to_disk(
        &self,
        doi: &str,
        resolved: &ResolvedPdf,
        output_dir: &Path,
        file_meta: Option<&FileMetadata>,
    ) -> Result<(String, PathBuf), DownloadError> {
        let verified = self
            .resolver
            .verifier()
            .verify(&resolved.url, Some(&resolved.referer), true)
            .await;
        if !verified.is_pdf {
            return Err(DownloadError::verification_mismatch(&resolved.url));
        }

        let url = verified.final_url.unwrap_or_else(|| resolved.url.clone());
        let response = match verified.response {
            Some(response) => response,
            None => self.request_pdf(&url, &resolved.referer).await?,
        };

        let filename = choose_filename(doi, file_meta, &response);
        let file_path = resolve_unique_path(output_dir, &filename);
        let bytes = write_body(response, &file_path, &url).await?;
        debug!(bytes, path = %file_path.display(), "body written");
        Ok((url, file_path))
    }

    async fn request_pdf(&self, url: &str, referer: &str) -> Result<FetchResponse, DownloadError> {
        let request = FetchRequest::get(url)
            .with_referer(Some(referer))
            .with_accept(PDF_ACCEPT);
        let response = self
            .resolver
            .transport()
            .send(&request)
            .await
            .map_err(|e| DownloadError::fetch(url, e))?;
        if !response.is_success() {
            return Err(DownloadError::http_status(url, response.status));
        }
        Ok(response)
    }
}

/// Trimmed, non-empty DOIs with later repeats removed.
/// Comparison key for DOIs: trimmed and lowercased.
fn doi_key(doi: &str) -> String {
    doi.trim().to_lowercase()
}

fn distinct_dois(dois: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    dois.iter()
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .filter(|d| seen.insert(doi_key(d)))
        .map(str::to_string)
        .collect()
}

/// Re-keys caller metadata by [`doi_key`]; on a key clash the first entry
/// in sorted key order wins.
fn index_metadata(metadata: &HashMap<String, FileMetadata>) -> HashMap<String, &FileMetadata> {
    let mut keys: Vec<&String> = metadata.keys().collect();
    keys.sort();
    let mut indexed = HashMap::with_capacity(keys.len());
    for key in keys {
        indexed.entry(doi_key(key)).or_insert(&metadata[key]);
    }
    indexed
}

/// Metadata name, then Content-Disposition, then the sanitized DOI.
fn choose_filename(doi: &str, file_meta: Option<&FileMetadata>, response: &FetchResponse) -> String {
    if let Some(meta) = file_meta {
        return descriptive_filename(meta.index, &meta.title, &meta.author, doi);
    }
    if let Some(name) = response
        .header_str(CONTENT_DISPOSITION.as_str())
        .and_then(parse_content_disposition)
    {
        return sanitize_server_filename(&name);
    }
    format!("{}.pdf", sanitize_doi_for_filename(doi))
}

/// Streams the body into `path`, removing the partial file on failure.
async fn write_body(mut response: FetchResponse, path: &Path, url: &str) -> Result<u64, DownloadError> {
    let file = File::create(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?;
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);

    let result = stream_into(&mut response, &mut writer, path, url).await;
    drop(writer);
    if result.is_err() {
        debug!(path = %path.display(), "cleaning up partial file after error");
        if let Err(error) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %error, "could not remove partial file");
        }
    }
    result
}

async fn stream_into(
    response: &mut FetchResponse,
    writer: &mut BufWriter<File>,
    path: &Path,
    url: &str,
) -> Result<u64, DownloadError> {
    let mut bytes_written: u64 = 0;
    while let Some(chunk) = response
        .body
        .chunk()
        .await
        .map_err(|e| DownloadError::fetch(url, e))?
    {
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        bytes_written += chunk.len() as u64;
    }
    writer.flush().await.map_err(|e| DownloadError::io(path, e))?;
    Ok(bytes_written)
}
