//! HTTP transport seam.
//!
//! Everything that talks to publishers goes through the [`Transport`] trait so
//! resolution and verification logic can be exercised against scripted
//! responses. [`HttpSession`] is the production implementation.

mod client;
mod error;

use std::collections::VecDeque;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap};

pub use client::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, HttpSession, SessionOptions};
pub use error::FetchError;

/// Accept header sent when probing a candidate PDF URL.
pub const PDF_ACCEPT: &str = "application/pdf,application/octet-stream;q=0.9,*/*;q=0.8";

/// HTTP method used by a [`FetchRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchMethod {
    /// Headers only.
    Head,
    /// Full fetch.
    Get,
}

/// A single outbound request. Redirects are always followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// HTTP method.
    pub method: FetchMethod,
    /// Absolute URL.
    pub url: String,
    /// Referring page, if known.
    pub referer: Option<String>,
    /// Accept header override. `None` sends the HTML default.
    pub accept: Option<&'static str>,
}

impl FetchRequest {
    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: FetchMethod::Get,
            url: url.into(),
            referer: None,
            accept: None,
        }
    }

    /// Creates a HEAD request.
    pub fn head(url: impl Into<String>) -> Self {
        Self {
            method: FetchMethod::Head,
            ..Self::get(url)
        }
    }

    /// Sets the Referer header.
    #[must_use]
    pub fn with_referer(mut self, referer: Option<&str>) -> Self {
        self.referer = referer.map(str::to_string);
        self
    }

    /// Sets the Accept header.
    #[must_use]
    pub fn with_accept(mut self, accept: &'static str) -> Self {
        self.accept = Some(accept);
        self
    }
}

/// Body of an open response.
///
/// Dropping the body closes the underlying connection.
#[async_trait]
pub trait ResponseBody: Send {
    /// Returns up to `len` leading bytes without consuming them.
    ///
    /// Returns `Ok(None)` when this body cannot peek non-destructively; the
    /// caller must then fall back to [`ResponseBody::chunk`].
    async fn peek(&mut self, len: usize) -> Result<Option<Vec<u8>>, FetchError>;

    /// Returns the next chunk, or `None` at end of stream.
    async fn chunk(&mut self) -> Result<Option<Vec<u8>>, FetchError>;
}

/// Anything that can send a [`FetchRequest`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request, following redirects.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on transport failure. HTTP error statuses are
    /// not errors; inspect [`FetchResponse::status`].
    async fn send(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// Response with an open body handle.
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// URL after following redirects.
    pub final_url: String,
    /// Response headers.
    pub headers: HeaderMap,
    /// Body handle.
    pub body: Box<dyn ResponseBody>,
}

impl std::fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .field("final_url", &self.final_url)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl FetchResponse {
    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns a header value as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Lowercased Content-Type header, or empty.
    #[must_use]
    pub fn content_type(&self) -> String {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default()
    }

    /// True when the Content-Type header declares a PDF.
    #[must_use]
    pub fn declares_pdf(&self) -> bool {
        self.content_type().contains("application/pdf")
    }

    /// Reads the whole body.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the stream fails mid-read.
    pub async fn bytes(mut self) -> Result<Vec<u8>, FetchError> {
        let mut out = Vec::new();
        while let Some(chunk) = self.body.chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    /// Reads the whole body as text, replacing invalid UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the stream fails mid-read.
    pub async fn text(self) -> Result<String, FetchError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Fully buffered body. Supports peeking.
#[derive(Debug, Default)]
pub struct MemoryBody {
    chunks: VecDeque<Vec<u8>>,
}

impl MemoryBody {
    /// Wraps a complete body as a single chunk.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        let mut chunks = VecDeque::new();
        if !bytes.is_empty() {
            chunks.push_back(bytes);
        }
        Self { chunks }
    }
}

#[async_trait]
impl ResponseBody for MemoryBody {
    async fn peek(&mut self, len: usize) -> Result<Option<Vec<u8>>, FetchError> {
        let mut prefix = Vec::with_capacity(len);
        for chunk in &self.chunks {
            let needed = len - prefix.len();
            if needed == 0 {
                break;
            }
            prefix.extend_from_slice(&chunk[..needed.min(chunk.len())]);
        }
        Ok(Some(prefix))
    }

    async fn chunk(&mut self) -> Result<Option<Vec<u8>>, FetchError> {
        Ok(self.chunks.pop_front())
    }
}
