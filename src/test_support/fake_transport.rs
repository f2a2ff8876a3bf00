//! Scripted in-memory [`Transport`] for resolver and verifier tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::transport::{
    FetchError, FetchMethod, FetchRequest, FetchResponse, MemoryBody, ResponseBody, Transport,
};

/// A canned reply for one (method, url) route.
#[derive(Debug, Clone)]
pub(crate) struct Canned {
    pub status: u16,
    pub final_url: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub peekable: bool,
    pub fail: bool,
}

impl Canned {
    pub fn ok(content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            final_url: None,
            headers: vec![("content-type".to_string(), content_type.to_string())],
            body: body.into(),
            peekable: true,
            fail: false,
        }
    }

    pub fn html(body: &str) -> Self {
        Self::ok("text/html; charset=utf-8", body.as_bytes().to_vec())
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::ok("text/html", Vec::new())
        }
    }

    pub fn transport_error() -> Self {
        Self {
            fail: true,
            ..Self::status(0)
        }
    }

    pub fn redirected_to(mut self, final_url: &str) -> Self {
        self.final_url = Some(final_url.to_string());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn without_peek(mut self) -> Self {
        self.peekable = false;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

type Route = (FetchMethod, String);

/// Transport returning [`Canned`] replies; unknown routes answer 404.
///
/// A route with several replies serves them in order and repeats the last.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: HashMap<Route, Vec<Canned>>,
    served: Mutex<HashMap<Route, usize>>,
    requests: Mutex<Vec<FetchRequest>>,
    body_reads: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_get(mut self, url: &str, reply: Canned) -> Self {
        self.routes.insert((FetchMethod::Get, url.to_string()), vec![reply]);
        self
    }

    pub fn on_head(mut self, url: &str, reply: Canned) -> Self {
        self.routes.insert((FetchMethod::Head, url.to_string()), vec![reply]);
        self
    }

    /// Queues a reply served after the earlier ones for this GET route.
    pub fn then_get(mut self, url: &str, reply: Canned) -> Self {
        self.routes
            .entry((FetchMethod::Get, url.to_string()))
            .or_default()
            .push(reply);
        self
    }

    fn next_reply(&self, route: &Route) -> Option<Canned> {
        let replies = self.routes.get(route)?;
        let mut served = self.served.lock().ok()?;
        let count = served.entry(route.clone()).or_insert(0);
        let reply = replies.get(*count).or_else(|| replies.last()).cloned();
        *count += 1;
        reply
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn requested_urls(&self, method: FetchMethod) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .map(|r| r.url)
            .collect()
    }

    /// Number of `chunk` calls served across every body handed out.
    pub fn body_reads(&self) -> usize {
        self.body_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(request.clone());
        }
        let canned = self
            .next_reply(&(request.method, request.url.clone()))
            .unwrap_or_else(|| Canned::status(404));
        if canned.fail {
            return Err(FetchError::timeout(request.url.clone()));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &canned.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }

        let body = if request.method == FetchMethod::Head {
            Vec::new()
        } else {
            canned.body
        };
        let body: Box<dyn ResponseBody> = Box::new(CountingBody {
            inner: MemoryBody::new(body),
            peekable: canned.peekable,
            reads: Arc::clone(&self.body_reads),
        });

        Ok(FetchResponse {
            status: canned.status,
            final_url: canned.final_url.unwrap_or_else(|| request.url.clone()),
            headers,
            body,
        })
    }
}

/// Body that counts reads and can refuse to peek.
struct CountingBody {
    inner: MemoryBody,
    peekable: bool,
    reads: Arc<AtomicUsize>,
}

#[async_trait]
impl ResponseBody for CountingBody {
    async fn peek(&mut self, len: usize) -> Result<Option<Vec<u8>>, FetchError> {
        if self.peekable {
            self.inner.peek(len).await
        } else {
            Ok(None)
        }
    }

    async fn chunk(&mut self) -> Result<Option<Vec<u8>>, FetchError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.chunk().await
    }
}
