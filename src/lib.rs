//! Harvester Core Library
//!
//! This library searches a public scholarly metadata API and makes a
//! best-effort attempt to retrieve the full-text PDF behind every DOI it
//! returns, packaging what it finds into a single archive.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`search`] - Paginated metadata queries normalized into [`WorkRecord`] rows
//! - [`html`] - Heuristics that pull candidate PDF links out of publisher pages
//! - [`transport`] - Explicit HTTP session plus the [`Transport`] seam
//! - [`verify`] - Signature-based PDF verification of candidate URLs
//! - [`resolve`] - Per-DOI resolution pipeline with a structured trace
//! - [`download`] - Sequential batch downloader and filename generation
//! - [`archive`] - Zip packaging of downloaded files
//! - [`usage`] - Anonymized usage event sinks
//! - [`config`] - File and environment configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod config;
pub mod download;
pub mod html;
pub mod resolve;
pub mod search;
pub mod transport;
pub mod usage;
pub mod user_agent;
pub mod verify;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use archive::{ArchiveError, ArchiveSummary, package_pdfs};
pub use config::{ConfigError, FileConfig, LoadedConfig, load_default_file_config};
pub use download::{
    BatchDownloader, BatchStats, DoiOutcome, DownloadError, DownloadOutcome, FileMetadata,
    ProgressReporter, descriptive_filename, sanitize_doi_for_filename,
};
pub use resolve::{
    DiagnosticsDir, DoiResolver, Resolution, ResolutionMethod, ResolutionTrace, ResolvedPdf,
    ResolverEndpoints, TraceStep,
};
pub use search::{
    AccessFilter, OpenAlexClient, SearchError, SearchParams, SearchType, SortOrder, WorkRecord,
    reconstruct_abstract,
};
pub use transport::{
    FetchError, FetchRequest, FetchResponse, HttpSession, ResponseBody, SessionOptions, Transport,
};
pub use usage::{NoopUsageSink, UsageEvent, UsageSink, usage_sink_from_path};
pub use verify::{PdfVerifier, VerifiedPdf};
