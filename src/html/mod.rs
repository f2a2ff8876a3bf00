//! HTML heuristics for locating full-text PDFs on publisher pages.
//!
//! Four independent strategies, each taking raw HTML plus the URL the page
//! was served from:
//!
//! - [`find_meta_pdf_url`] - `citation_pdf_url` style meta tags and PDF `<link>`s
//! - [`find_direct_pdf_links`] - anchors that look like PDF or galley downloads
//! - [`find_view_link`] - a link to an in-site viewer page
//! - [`extract_download_links_from_view`] - download links on such a viewer page
//!
//! Matching is case-insensitive and every returned URL is absolute. The
//! functions are synchronous; the parsed document never outlives the call.

mod links;
mod meta;
mod view;

pub use links::find_direct_pdf_links;
pub use meta::find_meta_pdf_url;
pub use view::{extract_download_links_from_view, find_view_link};

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Elements that can embed a document viewer.
const EMBED_SELECTOR: &str = "iframe, embed, object";

/// Selects every element matching `css`, in document order.
fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// Trimmed attribute value, `None` when missing or blank.
fn attr<'a>(element: &ElementRef<'a>, name: &str) -> Option<&'a str> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Lowercased, trimmed visible text.
fn text_lower(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_lowercase()
}

/// `src` or `data` of an embedding element.
fn embed_source<'a>(element: &ElementRef<'a>) -> Option<&'a str> {
    attr(element, "src").or_else(|| attr(element, "data"))
}

/// Resolves `href` against the page URL.
///
/// When the page URL itself is unparseable only absolute hrefs survive.
fn absolutize(base: Option<&Url>, href: &str) -> Option<String> {
    let resolved = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    Some(resolved.to_string())
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Removes repeats while keeping first-seen order.
fn dedup_preserving_order(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| seen.insert(url.clone()))
        .collect()
}
