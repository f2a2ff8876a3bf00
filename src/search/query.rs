//! Search parameters and their mapping onto API query pairs.

use serde::{Deserialize, Serialize};

use super::SearchError;

/// Comma-separated list of fields requested from the works endpoint.
pub const SELECT_FIELDS: &str = "id,doi,display_name,publication_year,primary_location,biblio,\
authorships,cited_by_count,open_access,best_oa_location,abstract_inverted_index,locations";

/// Maximum page size the API accepts.
pub const MAX_PER_PAGE: usize = 200;

/// Default number of results requested.
pub const DEFAULT_MAX_RESULTS: usize = 50;

/// Publication years accepted as filter bounds.
pub const YEAR_RANGE: std::ops::RangeInclusive<i32> = 0..=9999;

/// Which fields the query text is matched against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    /// Full-text relevance search.
    #[default]
    General,
    /// Title and abstract only.
    TitleAbstract,
    /// Title only.
    TitleOnly,
}

/// Open-access restriction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessFilter {
    /// No restriction.
    #[default]
    All,
    /// `is_oa:true`
    OpenAccessOnly,
    /// `is_oa:false`
    ClosedOnly,
}

impl AccessFilter {
    fn filter_clause(self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::OpenAccessOnly => Some("is_oa:true"),
            Self::ClosedOnly => Some("is_oa:false"),
        }
    }
}

/// Result ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// `relevance_score:desc`
    #[default]
    Relevance,
    /// `cited_by_count:desc`
    Citations,
    /// `publication_year:desc`
    Recent,
}

impl SortOrder {
    /// API sort key.
    #[must_use]
    pub fn as_param(self) -> &'static str {
        match self {
            Self::Relevance => "relevance_score:desc",
            Self::Citations => "cited_by_count:desc",
            Self::Recent => "publication_year:desc",
        }
    }
}

/// Everything a search needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pub query: String,
    pub max_results: usize,
    pub search_type: SearchType,
    pub access: AccessFilter,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub sort: SortOrder,
}

impl SearchParams {
    /// Creates parameters with defaults for everything except the query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: DEFAULT_MAX_RESULTS,
            search_type: SearchType::default(),
            access: AccessFilter::default(),
            year_from: None,
            year_to: None,
            sort: SortOrder::default(),
        }
    }

    /// Checks the parameters before any request is made.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidQuery`] for an empty query, a zero
    /// result limit, a year outside [`YEAR_RANGE`], or an inverted year range.
    pub fn validate(&self) -> Result<(), SearchError> {
        if normalize_query(&self.query).is_empty() {
            return Err(SearchError::invalid_query("query is empty"));
        }
        if self.max_results == 0 {
            return Err(SearchError::invalid_query("max_results must be at least 1"));
        }
        for (name, year) in [("year_from", self.year_from), ("year_to", self.year_to)] {
            if let Some(year) = year
                && !YEAR_RANGE.contains(&year)
            {
                return Err(SearchError::invalid_query(format!(
                    "{name} {year} is outside {}..={}",
                    YEAR_RANGE.start(),
                    YEAR_RANGE.end()
                )));
            }
        }
        if let (Some(from), Some(to)) = (self.year_from, self.year_to)
            && from > to
        {
            return Err(SearchError::invalid_query(format!(
                "year_from {from} is after year_to {to}"
            )));
        }
        Ok(())
    }

    /// Page size sent to the API.
    #[must_use]
    pub fn per_page(&self) -> usize {
        self.max_results.min(MAX_PER_PAGE)
    }

    /// Query pairs for the first page, excluding `cursor` and `mailto`.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let query = normalize_query(&self.query);
        let mut pairs = vec![
            ("per_page", self.per_page().to_string()),
            ("select", SELECT_FIELDS.to_string()),
            ("sort", self.sort.as_param().to_string()),
        ];

        let mut filters: Vec<String> = Vec::new();
        match self.search_type {
            SearchType::General => pairs.push(("search", query)),
            SearchType::TitleAbstract => filters.push(format!("title_and_abstract.search:{query}")),
            SearchType::TitleOnly => filters.push(format!("title.search:{query}")),
        }
        if let Some(clause) = self.access.filter_clause() {
            filters.push(clause.to_string());
        }
        if let Some(clause) = year_clause(self.year_from, self.year_to) {
            filters.push(clause);
        }
        if !filters.is_empty() {
            pairs.push(("filter", filters.join(",")));
        }
        pairs
    }
}

fn year_clause(from: Option<i32>, to: Option<i32>) -> Option<String> {
    match (from, to) {
        (Some(from), Some(to)) => Some(format!("publication_year:{from}-{to}")),
        (Some(from), None) => Some(format!("publication_year:>{}", from.saturating_sub(1))),
        (None, Some(to)) => Some(format!("publication_year:<{}", to.saturating_add(1))),
        (None, None) => None,
    }
}

/// Trims the query and joins comma-separated terms with ` OR `.
///
/// Commas inside double quotes are left alone; empty terms are dropped.
#[must_use]
pub fn normalize_query(raw: &str) -> String {
    let mut terms: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in raw.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ',' if !in_quotes => terms.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    terms.push(current);

    terms
        .iter()
        .map(|term| term.trim())
        .filter(|term| !term.is_empty())
        .collect::<Vec<_>>()
        .join(" OR ")
}
