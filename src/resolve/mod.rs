//! Per-DOI PDF resolution.
//!
//! [`DoiResolver::resolve`] walks a fixed sequence of strategies and stops at
//! the first candidate the [`PdfVerifier`] accepts:
//!
//! 1. fetch the DOI resolver URL (failure ends the attempt)
//! 2. swap a Crossref API payload for the article page it names
//! 3. `citation_pdf_url` style meta tags
//! 4. direct PDF anchors, trying the OJS download form of viewer links first
//! 5. a viewer page and the download links on it
//!
//! Every phase is appended to a [`ResolutionTrace`], whatever the outcome.

mod crossref;
mod diagnostics;
mod trace;

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use url::Url;

pub use diagnostics::{DEFAULT_DIAGNOSTICS_DIR, DiagnosticsDir, PageKind};
pub use trace::{ResolutionTrace, TraceStep};

use crate::download::sanitize_doi_for_filename;
use crate::html::{
    extract_download_links_from_view, find_direct_pdf_links, find_meta_pdf_url, find_view_link,
};
use crate::search::strip_doi_prefix;
use crate::transport::{FetchRequest, Transport};
use crate::verify::PdfVerifier;

#[allow(clippy::expect_used)]
static OJS_VIEW_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/article/view/").expect("OJS view regex is valid") // Static pattern, safe to panic
});

/// Which strategy produced a verified PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    MetaPdf,
    DirectLinkOjs,
    DirectLink,
    ViewDownload,
}

impl ResolutionMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MetaPdf => "meta_pdf",
            Self::DirectLinkOjs => "direct_link_ojs",
            Self::DirectLink => "direct_link",
            Self::ViewDownload => "view_download",
        }
    }
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verified PDF location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPdf {
    /// Final URL reported by verification.
    pub url: String,
    pub method: ResolutionMethod,
    /// Page the link was found on, sent as Referer when downloading.
    pub referer: String,
}

/// Outcome of one attempt plus its trace.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// `None` when no candidate verified.
    pub outcome: Option<ResolvedPdf>,
    pub trace: ResolutionTrace,
}

/// Base URLs the resolver talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverEndpoints {
    /// DOI resolver, e.g. `https://doi.org`.
    pub doi_base_url: String,
    /// Crossref API host used to recognize JSON landings.
    pub crossref_api_base: String,
}

impl Default for ResolverEndpoints {
    fn default() -> Self {
        Self {
            doi_base_url: "https://doi.org".to_string(),
            crossref_api_base: "https://api.crossref.org".to_string(),
        }
    }
}

impl ResolverEndpoints {
    /// Resolver URL for a bare DOI.
    #[must_use]
    pub fn doi_url(&self, doi: &str) -> String {
        format!("{}/{doi}", self.doi_base_url.trim_end_matches('/'))
    }

    /// True when `url` is served by the Crossref API host.
    #[must_use]
    pub fn is_crossref_api(&self, url: &str) -> bool {
        match (Url::parse(url), Url::parse(&self.crossref_api_base)) {
            (Ok(candidate), Ok(api)) => {
                candidate.host_str().map(str::to_ascii_lowercase)
                    == api.host_str().map(str::to_ascii_lowercase)
                    && candidate.port_or_known_default() == api.port_or_known_default()
            }
            _ => false,
        }
    }
}

/// Rewrites an OJS viewer URL to its download form.
///
/// Returns `None` when the URL has no `/article/view/` segment.
#[must_use]
pub fn ojs_download_url(url: &str) -> Option<String> {
    OJS_VIEW_SEGMENT
        .is_match(url)
        .then(|| OJS_VIEW_SEGMENT.replace_all(url, "/article/download/").into_owned())
}

/// Drives the resolution strategies for one DOI at a time.
pub struct DoiResolver {
    transport: Arc<dyn Transport>,
    verifier: PdfVerifier,
    endpoints: ResolverEndpoints,
    diagnostics: Option<DiagnosticsDir>,
}

impl fmt::Debug for DoiResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DoiResolver")
            .field("endpoints", &self.endpoints)
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}

impl DoiResolver {
    /// Creates a resolver using the production endpoints and no diagnostics.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            verifier: PdfVerifier::new(Arc::clone(&transport)),
            transport,
            endpoints: ResolverEndpoints::default(),
            diagnostics: None,
        }
    }

    #[must_use]
    pub fn with_endpoints(mut self, endpoints: ResolverEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Enables saving landing and view pages under `diagnostics`.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Option<DiagnosticsDir>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    #[must_use]
    pub fn verifier(&self) -> &PdfVerifier {
        &self.verifier
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    #[must_use]
    pub fn diagnostics(&self) -> Option<&DiagnosticsDir> {
        self.diagnostics.as_ref()
    }

    /// Resolves `doi` to a verified PDF URL, recording every phase.
    #[instrument(skip(self), fields(doi = %doi))]
    pub async fn resolve(&self, doi: &str) -> Resolution {
        let mut trace = ResolutionTrace::new(doi);
        let outcome = self.run(doi, &mut trace).await;

        match &outcome {
            Some(found) => info!(method = %found.method, url = %found.url, "resolved PDF"),
            None => info!("no verified PDF found"),
        }
        trace.push(TraceStep::Outcome {
            resolved: outcome.is_some(),
            url: outcome.as_ref().map(|o| o.url.clone()),
            method: outcome.as_ref().map(|o| o.method),
        });
        Resolution { outcome, trace }
    }

    async fn run(&self, doi: &str, trace: &mut ResolutionTrace) -> Option<ResolvedPdf> {
        let bare_doi = strip_doi_prefix(doi);
        let safe_doi = sanitize_doi_for_filename(doi);
        let (mut base, mut body) = self.fetch_landing(&bare_doi, trace).await?;

        if self.endpoints.is_crossref_api(&base) {
            trace.push(TraceStep::CrossrefApiDetected { url: base.clone() });
            match crossref::primary_article_url(&body) {
                Ok(Some(primary)) => {
                    trace.push(TraceStep::CrossrefPrimaryUrl {
                        url: primary.clone(),
                    });
                    let (article_url, article_body) = self.fetch_article_page(&primary, trace).await?;
                    base = article_url;
                    body = article_body;
                }
                Ok(None) => debug!("Crossref payload has no primary URL"),
                Err(error) => {
                    warn!(error = %error, "Crossref landing is not valid JSON");
                    trace.push(TraceStep::CrossrefJsonParseError {
                        error: error.to_string(),
                    });
                }
            }
        }

        if let Some(dir) = &self.diagnostics
            && let Err(error) = dir.save_page(&safe_doi, PageKind::Landing, &body).await
        {
            trace.push(TraceStep::DebugSaveLanding {
                error: error.to_string(),
            });
        }
        let html = String::from_utf8_lossy(&body).into_owned();
        drop(body);

        if let Some(found) = self.try_meta(&html, &base, trace).await {
            return Some(found);
        }
        if let Some(found) = self.try_direct_links(&html, &base, trace).await {
            return Some(found);
        }
        self.try_view_page(&html, &base, &safe_doi, trace).await
    }

    /// Step 1: the DOI resolver. Returns the final URL and body on 2xx.
    async fn fetch_landing(&self, doi: &str, trace: &mut ResolutionTrace) -> Option<(String, Vec<u8>)> {
        let request_url = self.endpoints.doi_url(doi);
        let response = match self.transport.send(&FetchRequest::get(&request_url)).await {
            Ok(response) => response,
            Err(error) => {
                trace.push(TraceStep::Landing {
                    request: request_url,
                    status: None,
                    final_url: None,
                    error: Some(error.to_string()),
                });
                return None;
            }
        };

        let status = response.status;
        let final_url = response.final_url.clone();
        let success = response.is_success();
        let body = if success {
            response.bytes().await.map_err(|e| e.to_string())
        } else {
            Ok(Vec::new())
        };
        trace.push(TraceStep::Landing {
            request: request_url,
            status: Some(status),
            final_url: Some(final_url.clone()),
            error: body.as_ref().err().cloned(),
        });
        if !success {
            debug!(status, "landing request failed");
            return None;
        }
        body.ok().map(|body| (final_url, body))
    }

    /// Step 2: re-fetch the article page named by a Crossref payload.
    async fn fetch_article_page(
        &self,
        url: &str,
        trace: &mut ResolutionTrace,
    ) -> Option<(String, Vec<u8>)> {
        let response = match self.transport.send(&FetchRequest::get(url)).await {
            Ok(response) => response,
            Err(error) => {
                trace.push(TraceStep::ArticlePageError {
                    error: error.to_string(),
                });
                return None;
            }
        };
        trace.push(TraceStep::ArticlePage {
            status: response.status,
            url: response.final_url.clone(),
        });
        if !response.is_success() {
            return None;
        }
        let final_url = response.final_url.clone();
        match response.bytes().await {
            Ok(body) => Some((final_url, body)),
            Err(error) => {
                trace.push(TraceStep::ArticlePageError {
                    error: error.to_string(),
                });
                None
            }
        }
    }

    /// Step 3: meta tags.
    async fn try_meta(&self, html: &str, base: &str, trace: &mut ResolutionTrace) -> Option<ResolvedPdf> {
        let meta_pdf = find_meta_pdf_url(html, base);
        trace.push(TraceStep::MetaLookup {
            meta_pdf: meta_pdf.clone(),
        });
        let candidate = meta_pdf?;

        let verified = self.verifier.verify(&candidate, Some(base), false).await;
        trace.push(TraceStep::MetaTry {
            url: candidate.clone(),
            ok: verified.is_pdf,
            final_url: verified.final_url.clone(),
        });
        verified.is_pdf.then(|| ResolvedPdf {
            url: verified.final_url.unwrap_or(candidate),
            method: ResolutionMethod::MetaPdf,
            referer: base.to_string(),
        })
    }

    /// Step 4: direct anchors, OJS download form first.
    async fn try_direct_links(
        &self,
        html: &str,
        base: &str,
        trace: &mut ResolutionTrace,
    ) -> Option<ResolvedPdf> {
        let links = find_direct_pdf_links(html, base);
        trace.push(TraceStep::DirectLinksLookup {
            count: links.len(),
            links: links.clone(),
        });

        for link in links {
            if let Some(converted) = ojs_download_url(&link) {
                trace.push(TraceStep::OjsViewToDownload {
                    original: link.clone(),
                    converted: converted.clone(),
                });
                if let Some(found) = self
                    .try_candidate(&converted, base, ResolutionMethod::DirectLinkOjs, trace)
                    .await
                {
                    return Some(found);
                }
            }
            if let Some(found) = self
                .try_candidate(&link, base, ResolutionMethod::DirectLink, trace)
                .await
            {
                return Some(found);
            }
        }
        None
    }

    async fn try_candidate(
        &self,
        url: &str,
        referer: &str,
        method: ResolutionMethod,
        trace: &mut ResolutionTrace,
    ) -> Option<ResolvedPdf> {
        let verified = self.verifier.verify(url, Some(referer), false).await;
        trace.push(TraceStep::DirectLinkTry {
            url: url.to_string(),
            ok: verified.is_pdf,
            final_url: verified.final_url.clone(),
        });
        verified.is_pdf.then(|| ResolvedPdf {
            url: verified.final_url.unwrap_or_else(|| url.to_string()),
            method,
            referer: referer.to_string(),
        })
    }

    /// Step 5: viewer page, then the downloads it links to.
    async fn try_view_page(
        &self,
        html: &str,
        base: &str,
        safe_doi: &str,
        trace: &mut ResolutionTrace,
    ) -> Option<ResolvedPdf> {
        let view_url = find_view_link(html, base);
        trace.push(TraceStep::ViewLookup {
            view_url: view_url.clone(),
        });
        let view_url = view_url?;

        let request = FetchRequest::get(&view_url).with_referer(Some(base));
        let response = match self.transport.send(&request).await {
            Ok(response) => response,
            Err(error) => {
                trace.push(TraceStep::ViewRequest {
                    status: None,
                    final_url: None,
                    error: Some(error.to_string()),
                });
                return None;
            }
        };
        let view_final = response.final_url.clone();
        let status = response.status;
        if !response.is_success() {
            trace.push(TraceStep::ViewRequest {
                status: Some(status),
                final_url: Some(view_final),
                error: None,
            });
            return None;
        }
        let view_body = match response.bytes().await {
            Ok(body) => {
                trace.push(TraceStep::ViewRequest {
                    status: Some(status),
                    final_url: Some(view_final.clone()),
                    error: None,
                });
                body
            }
            Err(error) => {
                trace.push(TraceStep::ViewRequest {
                    status: Some(status),
                    final_url: Some(view_final),
                    error: Some(error.to_string()),
                });
                return None;
            }
        };

        if let Some(dir) = &self.diagnostics
            && let Err(error) = dir.save_page(safe_doi, PageKind::View, &view_body).await
        {
            trace.push(TraceStep::DebugSaveView {
                error: error.to_string(),
            });
        }

        let view_html = String::from_utf8_lossy(&view_body).into_owned();
        let links = extract_download_links_from_view(&view_html, &view_final);
        trace.push(TraceStep::DownloadLinks {
            count: links.len(),
            links: links.clone(),
        });

        for link in links {
            let verified = self.verifier.verify(&link, Some(&view_final), false).await;
            trace.push(TraceStep::DownloadTry {
                url: link.clone(),
                ok: verified.is_pdf,
                final_url: verified.final_url.clone(),
            });
            if verified.is_pdf {
                return Some(ResolvedPdf {
                    url: verified.final_url.unwrap_or(link),
                    method: ResolutionMethod::ViewDownload,
                    referer: view_final,
                });
            }
        }
        None
    }
}
