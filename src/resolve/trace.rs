//! Structured, append-only record of one DOI resolution attempt.

use serde::{Deserialize, Serialize};

use super::ResolutionMethod;

/// One phase of a resolution attempt, tagged by `phase` when serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TraceStep {
    /// The DOI resolver request.
    Landing {
        request: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        final_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// The landing URL is the Crossref API rather than an article page.
    CrossrefApiDetected { url: String },
    CrossrefPrimaryUrl { url: String },
    CrossrefJsonParseError { error: String },
    /// Re-fetch of the article URL named by the Crossref payload.
    ArticlePage { status: u16, url: String },
    ArticlePageError { error: String },
    DebugSaveLanding { error: String },
    MetaLookup {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meta_pdf: Option<String>,
    },
    MetaTry {
        url: String,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        final_url: Option<String>,
    },
    DirectLinksLookup { count: usize, links: Vec<String> },
    OjsViewToDownload { original: String, converted: String },
    DirectLinkTry {
        url: String,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        final_url: Option<String>,
    },
    ViewLookup {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        view_url: Option<String>,
    },
    ViewRequest {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        final_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    DebugSaveView { error: String },
    DownloadLinks { count: usize, links: Vec<String> },
    DownloadTry {
        url: String,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        final_url: Option<String>,
    },
    /// Terminal entry written once per attempt.
    Outcome {
        resolved: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<ResolutionMethod>,
    },
}

impl TraceStep {
    /// The serialized `phase` name.
    #[must_use]
    pub fn phase(&self) -> &'static str {
        match self {
            Self::Landing { .. } => "landing",
            Self::CrossrefApiDetected { .. } => "crossref_api_detected",
            Self::CrossrefPrimaryUrl { .. } => "crossref_primary_url",
            Self::CrossrefJsonParseError { .. } => "crossref_json_parse_error",
            Self::ArticlePage { .. } => "article_page",
            Self::ArticlePageError { .. } => "article_page_error",
            Self::DebugSaveLanding { .. } => "debug_save_landing",
            Self::MetaLookup { .. } => "meta_lookup",
            Self::MetaTry { .. } => "meta_try",
            Self::DirectLinksLookup { .. } => "direct_links_lookup",
            Self::OjsViewToDownload { .. } => "ojs_view_to_download",
            Self::DirectLinkTry { .. } => "direct_link_try",
            Self::ViewLookup { .. } => "view_lookup",
            Self::ViewRequest { .. } => "view_request",
            Self::DebugSaveView { .. } => "debug_save_view",
            Self::DownloadLinks { .. } => "download_links",
            Self::DownloadTry { .. } => "download_try",
            Self::Outcome { .. } => "outcome",
        }
    }
}

/// Ordered phases for a single DOI. Steps can be appended but never removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionTrace {
    doi: String,
    steps: Vec<TraceStep>,
}

impl ResolutionTrace {
    /// Starts an empty trace for `doi`.
    pub fn new(doi: impl Into<String>) -> Self {
        Self {
            doi: doi.into(),
            steps: Vec::new(),
        }
    }

    pub fn push(&mut self, step: TraceStep) {
        self.steps.push(step);
    }

    #[must_use]
    pub fn doi(&self) -> &str {
        &self.doi
    }

    #[must_use]
    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    /// Phase names in order, handy for assertions and log lines.
    #[must_use]
    pub fn phases(&self) -> Vec<&'static str> {
        self.steps.iter().map(TraceStep::phase).collect()
    }

    /// Pretty JSON document persisted as the diagnostics artifact.
    ///
    /// # Errors
    ///
    /// Returns an error only if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
