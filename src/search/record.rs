//! Flat row shape for works returned by the metadata API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::reconstruct_abstract;
use crate::download::surname_of;

/// One normalized search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRecord {
    pub title: String,
    /// Author display names in authorship order.
    pub authors: Vec<String>,
    pub venue: String,
    pub year: Option<i32>,
    pub citation_count: u64,
    /// DOI without any `https://doi.org/` prefix; empty when the work has none.
    pub doi: String,
    /// API identifier of the work.
    pub source_id: String,
    pub is_open_access: bool,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub candidate_oa_pdf_url: Option<String>,
    pub candidate_oa_landing_url: Option<String>,
    /// The normalized query that produced this row.
    pub search_query: String,
}

impl WorkRecord {
    /// Builds a row from one raw API result.
    pub(crate) fn from_raw(raw: RawWork, search_query: &str) -> Self {
        let authors = raw
            .authorships
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| a.author.and_then(|p| p.display_name))
            .filter(|name| !name.trim().is_empty())
            .collect();

        let primary = raw.primary_location.unwrap_or_default();
        let best = raw.best_oa_location.unwrap_or_default();
        let venue = primary
            .source
            .as_ref()
            .and_then(|s| s.display_name.clone())
            .unwrap_or_default();
        let candidate_oa_pdf_url = non_empty(best.pdf_url).or_else(|| non_empty(primary.pdf_url));
        let candidate_oa_landing_url =
            non_empty(best.landing_page_url).or_else(|| non_empty(primary.landing_page_url));

        let abstract_text = raw
            .abstract_inverted_index
            .as_ref()
            .map(reconstruct_abstract)
            .unwrap_or_default();

        Self {
            title: raw.display_name.unwrap_or_default(),
            authors,
            venue,
            year: raw.publication_year,
            citation_count: raw.cited_by_count.unwrap_or(0),
            doi: strip_doi_prefix(raw.doi.as_deref().unwrap_or_default()),
            source_id: raw.id.unwrap_or_default(),
            is_open_access: open_access_flag(raw.open_access.as_ref()),
            abstract_text,
            candidate_oa_pdf_url,
            candidate_oa_landing_url,
            search_query: search_query.to_string(),
        }
    }

    /// Surname of the first author, using the same rule as PDF filenames.
    #[must_use]
    pub fn first_author_surname(&self) -> Option<String> {
        surname_of(self.authors.first()?)
    }
}

/// Strips `https://doi.org/`, `http://doi.org/` and `doi:` prefixes.
#[must_use]
pub fn strip_doi_prefix(doi: &str) -> String {
    let trimmed = doi.trim();
    let lower = trimmed.to_ascii_lowercase();
    for prefix in [
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
        "doi:",
    ] {
        if lower.starts_with(prefix) {
            return trimmed[prefix.len()..].trim().to_string();
        }
    }
    trimmed.to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn open_access_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Object(map)) => map.get("is_oa").and_then(Value::as_bool).unwrap_or(false),
        Some(Value::Bool(flag)) => *flag,
        _ => false,
    }
}

/// Cursor page envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct RawPage {
    #[serde(default)]
    pub results: Option<Vec<Value>>,
    #[serde(default)]
    pub meta: Option<RawMeta>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMeta {
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawWork {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    publication_year: Option<i32>,
    #[serde(default)]
    cited_by_count: Option<u64>,
    #[serde(default)]
    authorships: Option<Vec<RawAuthorship>>,
    #[serde(default)]
    primary_location: Option<RawLocation>,
    #[serde(default)]
    best_oa_location: Option<RawLocation>,
    #[serde(default)]
    open_access: Option<Value>,
    #[serde(default)]
    abstract_inverted_index: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawAuthorship {
    #[serde(default)]
    author: Option<RawAuthor>,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLocation {
    #[serde(default)]
    source: Option<RawSource>,
    #[serde(default)]
    pdf_url: Option<String>,
    #[serde(default)]
    landing_page_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    #[serde(default)]
    display_name: Option<String>,
}
