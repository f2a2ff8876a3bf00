//! Error types for the download module.

use std::path::PathBuf;

use thiserror::Error;

use crate::transport::FetchError;

/// Errors raised while downloading one resolved PDF, or while preparing a batch.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// File system error (creating the output directory, writing the file).
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The body could not be fetched or streamed.
    #[error("fetch failed for {url}: {source}")]
    Fetch {
        /// The URL being downloaded.
        url: String,
        /// The underlying transport error.
        #[source]
        source: FetchError,
    },

    /// A URL was resolved but did not verify as a PDF at download time.
    #[error("download failed from {url}: content is not a PDF")]
    VerificationMismatch {
        /// The resolved URL.
        url: String,
    },

    /// The re-request at download time returned an error status.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL being downloaded.
        url: String,
        /// The HTTP status code.
        status: u16,
    },
}

impl DownloadError {
    /// Creates an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a fetch error with URL context.
    pub fn fetch(url: impl Into<String>, source: FetchError) -> Self {
        Self::Fetch {
            url: url.into(),
            source,
        }
    }

    /// Creates a verification-mismatch error.
    pub fn verification_mismatch(url: impl Into<String>) -> Self {
        Self::VerificationMismatch { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }
}
