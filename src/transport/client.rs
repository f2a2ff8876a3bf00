//! Explicitly constructed HTTP session shared by search, resolution and download.
//!
//! The session centralizes networking defaults (timeouts, user-agent,
//! compression, cookie persistence, proxy compatibility) so every request the
//! crate issues behaves the same way.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use reqwest::{Client, ClientBuilder, Proxy};
use tracing::{debug, instrument, warn};
use url::Url;

use super::{FetchError, FetchMethod, FetchRequest, FetchResponse, ResponseBody, Transport};
use crate::user_agent::{BROWSER_USER_AGENT, default_api_user_agent};

/// Default connect timeout (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default whole-request timeout (25 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(25);

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.8";

/// Options used to construct an [`HttpSession`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Timeout applied to each whole request.
    pub request_timeout: Duration,
    /// User-Agent for metadata API traffic.
    pub user_agent: String,
    /// User-Agent for publisher pages and PDF probes.
    pub publisher_user_agent: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: default_api_user_agent(),
            publisher_user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

impl SessionOptions {
    /// Returns options with the given per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// HTTP session with connection pooling and a cookie store.
///
/// The session is created once and passed explicitly to the components that
/// fetch; cookies set by a landing page are therefore sent with the PDF
/// request that follows it.
#[derive(Debug, Clone)]
pub struct HttpSession {
    client: Client,
    publisher_user_agent: String,
}

impl HttpSession {
    /// Creates a session with default options.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] when the HTTP client cannot be built.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_options(SessionOptions::default())
    }

    /// Creates a session with explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] when the HTTP client cannot be built.
    #[instrument(level = "debug", skip_all, fields(timeout_secs = options.request_timeout.as_secs()))]
    pub fn with_options(options: SessionOptions) -> Result<Self, FetchError> {
        let client = build_client(&options)?;
        Ok(Self {
            client,
            publisher_user_agent: options.publisher_user_agent,
        })
    }

    /// Returns the underlying reqwest client (used for JSON API calls).
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for HttpSession {
    #[instrument(level = "debug", skip(self, request), fields(method = ?request.method, url = %request.url))]
    async fn send(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let parsed =
            Url::parse(&request.url).map_err(|_| FetchError::invalid_url(request.url.clone()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::invalid_url(request.url.clone()));
        }

        let mut builder = match request.method {
            FetchMethod::Head => self.client.head(parsed),
            FetchMethod::Get => self.client.get(parsed),
        };
        builder = builder
            .header(USER_AGENT, self.publisher_user_agent.as_str())
            .header(ACCEPT, request.accept.unwrap_or(HTML_ACCEPT))
            .header(ACCEPT_LANGUAGE, ACCEPT_LANGUAGE_VALUE);
        if let Some(referer) = &request.referer {
            builder = builder.header(REFERER, referer.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::network(request.url.clone(), e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response.headers().clone();
        debug!(status, final_url = %final_url, "response received");

        let body: Box<dyn ResponseBody> = Box::new(StreamBody::new(final_url.clone(), response));
        Ok(FetchResponse {
            status,
            final_url,
            headers,
            body,
        })
    }
}

type ChunkStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, reqwest::Error>> + Send>>;

/// Streaming body over a live reqwest response.
///
/// Peeking is supported by holding already received chunks in a local buffer
/// that subsequent [`ResponseBody::chunk`] calls drain first.
struct StreamBody {
    url: String,
    stream: ChunkStream,
    buffered: VecDeque<Vec<u8>>,
}

impl StreamBody {
    fn new(url: String, response: reqwest::Response) -> Self {
        let stream = response
            .bytes_stream()
            .map(|item| item.map(|bytes| bytes.to_vec()));
        Self {
            url,
            stream: Box::pin(stream),
            buffered: VecDeque::new(),
        }
    }

    fn buffered_len(&self) -> usize {
        self.buffered.iter().map(Vec::len).sum()
    }
}

#[async_trait]
impl ResponseBody for StreamBody {
    async fn peek(&mut self, len: usize) -> Result<Option<Vec<u8>>, FetchError> {
        while self.buffered_len() < len {
            match self.stream.next().await {
                Some(Ok(chunk)) => {
                    if !chunk.is_empty() {
                        self.buffered.push_back(chunk);
                    }
                }
                Some(Err(e)) => return Err(FetchError::network(self.url.clone(), e)),
                None => break,
            }
        }

        let mut prefix = Vec::with_capacity(len);
        for chunk in &self.buffered {
            let needed = len - prefix.len();
            if needed == 0 {
                break;
            }
            prefix.extend_from_slice(&chunk[..needed.min(chunk.len())]);
        }
        Ok(Some(prefix))
    }

    async fn chunk(&mut self) -> Result<Option<Vec<u8>>, FetchError> {
        if let Some(chunk) = self.buffered.pop_front() {
            return Ok(Some(chunk));
        }
        match self.stream.next().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(FetchError::network(self.url.clone(), e)),
            None => Ok(None),
        }
    }
}

fn build_client(options: &SessionOptions) -> Result<Client, FetchError> {
    match try_build_client(options, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Some sandboxed environments panic when querying system proxy
            // settings; retry with env-proxy support only.
            warn!(
                "HTTP client builder panicked while loading system proxy settings; retrying with env-proxy fallback"
            );
            match try_build_client(options, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Panic) => Err(FetchError::client_build(
                    "client builder panicked while applying env-proxy fallback",
                )),
                Err(BuildClientFailure::Build(error)) => {
                    Err(FetchError::client_build(error.to_string()))
                }
            }
        }
        Err(BuildClientFailure::Build(error)) => Err(FetchError::client_build(error.to_string())),
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    options: &SessionOptions,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    let options = options.clone();
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_client_builder(&options);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_client_builder(options: &SessionOptions) -> ClientBuilder {
    Client::builder()
        .connect_timeout(options.connect_timeout)
        .timeout(options.request_timeout)
        .gzip(true)
        .cookie_store(true)
        .user_agent(options.user_agent.clone())
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    match scheme {
        "https" => find_first_proxy_var(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"]),
        "http" => find_first_proxy_var(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]),
        _ => None,
    }
}

fn find_first_proxy_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
