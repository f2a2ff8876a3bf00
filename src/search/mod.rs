//! Metadata search against the OpenAlex works endpoint.
//!
//! [`OpenAlexClient::search`] builds a filtered, field-limited query, follows
//! the API's cursor pagination until enough rows are collected, and
//! normalizes every raw work into a [`WorkRecord`].
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::{HttpSession, OpenAlexClient, SearchParams};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = HttpSession::new()?;
//! let client = OpenAlexClient::new(&session);
//! let rows = client.search(&SearchParams::new("graphene, nanotubes")).await?;
//! println!("{} rows", rows.len());
//! # Ok(())
//! # }
//! ```

mod abstract_text;
mod error;
mod query;
mod record;
mod retry;

use std::time::Duration;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, RETRY_AFTER};
use tracing::{debug, info, instrument, warn};
use url::Url;

pub use abstract_text::reconstruct_abstract;
pub use error::SearchError;
pub use query::{
    AccessFilter, DEFAULT_MAX_RESULTS, MAX_PER_PAGE, SELECT_FIELDS, SearchParams, SearchType,
    SortOrder, YEAR_RANGE, normalize_query,
};
pub use record::{WorkRecord, strip_doi_prefix};
pub use retry::{DEFAULT_RETRY_DELAYS, parse_retry_after};

use record::{RawPage, RawWork};
use retry::is_retryable_status;

use crate::transport::HttpSession;

/// Production works endpoint.
pub const OPENALEX_WORKS_URL: &str = "https://api.openalex.org/works";

/// Paginated client for the works endpoint.
#[derive(Debug, Clone)]
pub struct OpenAlexClient {
    client: reqwest::Client,
    base_url: String,
    mailto: Option<String>,
    retry_delays: Vec<Duration>,
}

impl OpenAlexClient {
    /// Creates a client that shares the session's connection pool.
    #[must_use]
    pub fn new(session: &HttpSession) -> Self {
        Self {
            client: session.client().clone(),
            base_url: OPENALEX_WORKS_URL.to_string(),
            mailto: None,
            retry_delays: DEFAULT_RETRY_DELAYS.to_vec(),
        }
    }

    /// Overrides the works endpoint (used by tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Attaches a contact address sent as the `mailto` parameter.
    #[must_use]
    pub fn with_mailto(mut self, mailto: Option<String>) -> Self {
        self.mailto = mailto.filter(|m| !m.trim().is_empty());
        self
    }

    /// Overrides the per-attempt delays. An empty list still allows one attempt.
    #[must_use]
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = if delays.is_empty() {
            vec![Duration::ZERO]
        } else {
            delays
        };
        self
    }

    /// Runs a search and returns at most `params.max_results` rows.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] when parameters are invalid, the network
    /// fails, the API keeps throttling past the retry budget, or it answers
    /// with a non-retryable error status.
    #[instrument(skip(self, params), fields(query = %params.query, max_results = params.max_results))]
    pub async fn search(&self, params: &SearchParams) -> Result<Vec<WorkRecord>, SearchError> {
        params.validate()?;
        let search_query = normalize_query(&params.query);
        let base_pairs = params.query_pairs();

        let mut raw_works: Vec<RawWork> = Vec::new();
        let mut cursor = "*".to_string();
        let mut pages = 0_usize;

        while raw_works.len() < params.max_results {
            let url = self.page_url(&base_pairs, &cursor)?;
            let page = self.request_page(url).await?;
            pages += 1;

            let results = page.results.unwrap_or_default();
            let batch_len = results.len();
            for value in results {
                match serde_json::from_value::<RawWork>(value) {
                    Ok(work) => raw_works.push(work),
                    Err(e) => warn!(error = %e, "skipping malformed work record"),
                }
            }

            let next_cursor = page
                .meta
                .and_then(|m| m.next_cursor)
                .filter(|c| !c.is_empty());
            debug!(page = pages, batch_len, has_next = next_cursor.is_some(), "fetched results page");

            match next_cursor {
                Some(next) if batch_len > 0 => cursor = next,
                _ => break,
            }
        }

        raw_works.truncate(params.max_results);
        let rows: Vec<WorkRecord> = raw_works
            .into_iter()
            .map(|raw| WorkRecord::from_raw(raw, &search_query))
            .collect();
        info!(rows = rows.len(), pages, "search complete");
        Ok(rows)
    }

    fn page_url(&self, base_pairs: &[(&'static str, String)], cursor: &str) -> Result<Url, SearchError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SearchError::invalid_query(format!("bad endpoint {}: {e}", self.base_url)))?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in base_pairs {
                query.append_pair(key, value);
            }
            query.append_pair("cursor", cursor);
            if let Some(mailto) = &self.mailto {
                query.append_pair("mailto", mailto);
            }
        }
        Ok(url)
    }

    async fn request_page(&self, url: Url) -> Result<RawPage, SearchError> {
        let attempts = self.retry_delays.len();
        let mut last_status = 0_u16;

        for (attempt, delay) in self.retry_delays.iter().enumerate() {
            if !delay.is_zero() {
                tokio::time::sleep(*delay).await;
            }

            let response = self
                .client
                .get(url.clone())
                .header(ACCEPT, "application/json")
                .header(ACCEPT_LANGUAGE, "en-US,en;q=0.8")
                .send()
                .await
                .map_err(SearchError::network)?;
            let status = response.status().as_u16();

            if status == 200 {
                let body = response.text().await.map_err(SearchError::network)?;
                return serde_json::from_str(&body).map_err(|e| SearchError::decode(e.to_string()));
            }

            if !is_retryable_status(status) {
                return Err(SearchError::http_status(status, url.as_str()));
            }

            last_status = status;
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            warn!(status, attempt = attempt + 1, attempts, ?retry_after, "metadata API throttled");
            if let Some(wait) = retry_after
                && attempt + 1 < attempts
            {
                tokio::time::sleep(wait).await;
            }
        }

        Err(SearchError::transient(last_status, attempts))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, ResponseTemplate};

    fn client_for(uri: &str) -> OpenAlexClient {
        let session = HttpSession::new().unwrap();
        OpenAlexClient::new(&session)
            .with_base_url(format!("{uri}/works"))
            .with_retry_delays(vec![Duration::ZERO; 3])
    }

    fn work(n: usize) -> serde_json::Value {
        json!({"id": format!("W{n}"), "doi": format!("https://doi.org/10.1/{n}"), "display_name": format!("Work {n}")})
    }

    #[test]
    fn test_page_url_includes_cursor_and_mailto() {
        let session = HttpSession::new().unwrap();
        let client = OpenAlexClient::new(&session).with_mailto(Some("me@example.org".to_string()));
        let params = SearchParams::new("a, b");
        let url = client.page_url(&params.query_pairs(), "*").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("cursor".to_string(), "*".to_string())));
        assert!(pairs.contains(&("mailto".to_string(), "me@example.org".to_string())));
        assert!(pairs.contains(&("search".to_string(), "a OR b".to_string())));
    }

    #[tokio::test]
    async fn test_search_follows_cursor_until_exhausted() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(query_param("cursor", "*"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "meta": {"next_cursor": "page2"},
                "results": [work(1), work(2)]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("cursor", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "meta": {"next_cursor": null},
                "results": [work(3)]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let rows = client_for(&server.uri())
            .search(&SearchParams::new("x"))
            .await
            .unwrap();
        let dois: Vec<&str> = rows.iter().map(|r| r.doi.as_str()).collect();
        assert_eq!(dois, vec!["10.1/1", "10.1/2", "10.1/3"]);
    }

    #[tokio::test]
    async fn test_search_stops_on_empty_page() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "meta": {"next_cursor": "again"},
                "results": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let rows = client_for(&server.uri())
            .search(&SearchParams::new("x"))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_search_retries_throttled_then_succeeds() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "meta": {}, "results": [work(1)]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let rows = client_for(&server.uri())
            .search(&SearchParams::new("x"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_search_throttled_past_budget_is_transient_error() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .expect(3)
            .mount(&server)
            .await;

        let err = client_for(&server.uri())
            .search(&SearchParams::new("x"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, SearchError::TransientUpstream { status: 403, attempts: 3 }),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn test_search_non_retryable_status_fails_immediately() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server.uri())
            .search(&SearchParams::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::HttpStatus { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_search_invalid_json_is_decode_error() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client_for(&server.uri())
            .search(&SearchParams::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Decode { .. }));
    }
}
