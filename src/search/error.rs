//! Error types for metadata search.

use thiserror::Error;

/// Errors raised by [`super::OpenAlexClient::search`].
#[derive(Debug, Error)]
pub enum SearchError {
    /// The API kept answering with a retryable status until the retry budget ran out.
    #[error("metadata API still returning HTTP {status} after {attempts} attempts")]
    TransientUpstream {
        /// Last status observed.
        status: u16,
        /// Number of attempts made.
        attempts: usize,
    },

    /// Non-retryable HTTP status.
    #[error("metadata API returned HTTP {status} for {url}")]
    HttpStatus {
        /// Status code.
        status: u16,
        /// Request URL.
        url: String,
    },

    /// Connection, TLS or timeout failure.
    #[error("network error calling metadata API: {source}")]
    Network {
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// Response body was not the expected JSON.
    #[error("failed to decode metadata API response: {reason}")]
    Decode {
        /// What went wrong.
        reason: String,
    },

    /// Query or parameters rejected before sending.
    #[error("invalid search query: {reason}")]
    InvalidQuery {
        /// Why the query was rejected.
        reason: String,
    },
}

impl SearchError {
    /// Creates a transient-upstream error.
    #[must_use]
    pub fn transient(status: u16, attempts: usize) -> Self {
        Self::TransientUpstream { status, attempts }
    }

    /// Creates an HTTP status error.
    pub fn http_status(status: u16, url: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(source: reqwest::Error) -> Self {
        Self::Network { source }
    }

    /// Creates a decode error.
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    /// Creates an invalid-query error.
    pub fn invalid_query(reason: impl Into<String>) -> Self {
        Self::InvalidQuery {
            reason: reason.into(),
        }
    }
}
