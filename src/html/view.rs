//! Viewer-page heuristics: finding the viewer, then the download behind it.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use url::Url;

use super::{
    EMBED_SELECTOR, absolutize, attr, contains_any, dedup_preserving_order, embed_source,
    select_all, text_lower,
};

const VIEW_HINTS: &[&str] = &[
    "view",
    "/article/view",
    "/viewarticle",
    "fulltext",
    "full-text",
    "full_text",
    "/ver",
    "leer",
];

const DOWNLOAD_HREF_HINTS: &[&str] = &[
    "download",
    "descargar",
    "pdf",
    "full-text",
    "fulltext",
    "/article/download",
    "/article/view/",
    "view/",
    ".pdf",
    "galley",
    "viewfile",
];

const DOWNLOAD_TEXT_HINTS: &[&str] = &[
    "download",
    "descargar",
    "pdf",
    "texto completo",
    "full text",
    "full-text",
    "article pdf",
];

/// OJS galley path: `/article/view/{submission}/{galley}`.
#[allow(clippy::expect_used)]
static OJS_GALLEY_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/article/view/(?:[^?#]*/)?\d+/\d+$").expect("OJS galley regex is valid") // Static pattern, safe to panic
});

/// Returns the first link to an in-site viewer page.
///
/// Anchors are checked before embedded frames; an anchor matches on its href
/// or its text, a frame on its `src`/`data`.
#[must_use]
pub fn find_view_link(html: &str, base_url: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let base = Url::parse(base_url).ok();

    for anchor in select_all(&document, "a[href]") {
        let Some(href) = attr(&anchor, "href") else {
            continue;
        };
        let matches = contains_any(&href.to_lowercase(), VIEW_HINTS)
            || contains_any(&text_lower(&anchor), VIEW_HINTS);
        if matches && let Some(url) = absolutize(base.as_ref(), href) {
            return Some(url);
        }
    }

    select_all(&document, EMBED_SELECTOR)
        .iter()
        .filter_map(embed_source)
        .filter(|src| contains_any(&src.to_lowercase(), VIEW_HINTS))
        .find_map(|src| absolutize(base.as_ref(), src))
}

/// Returns download candidates found on a viewer page, deduplicated in page order.
///
/// Anchors qualify on a download-ish href or text, or on an OJS
/// `/article/view/{id}/{galley}` path with numeric ids; embedded frames
/// qualify on a download-ish source. Anchors come before frames.
#[must_use]
pub fn extract_download_links_from_view(html: &str, base_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let base = Url::parse(base_url).ok();
    let mut found = Vec::new();

    for anchor in select_all(&document, "a[href]") {
        let Some(href) = attr(&anchor, "href") else {
            continue;
        };
        let qualifies = contains_any(&href.to_lowercase(), DOWNLOAD_HREF_HINTS)
            || contains_any(&text_lower(&anchor), DOWNLOAD_TEXT_HINTS)
            || is_ojs_galley_path(href);
        if qualifies && let Some(url) = absolutize(base.as_ref(), href) {
            found.push(url);
        }
    }

    for element in select_all(&document, EMBED_SELECTOR) {
        if let Some(src) = embed_source(&element)
            && contains_any(&src.to_lowercase(), DOWNLOAD_HREF_HINTS)
            && let Some(url) = absolutize(base.as_ref(), src)
        {
            found.push(url);
        }
    }

    dedup_preserving_order(found)
}

/// True for `/article/view/{id}/{galley}` style paths with numeric ids.
#[must_use]
pub fn is_ojs_galley_path(href: &str) -> bool {
    OJS_GALLEY_PATH.is_match(href.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://revista.example/index.php/rev/article/view/42";

    #[test]
    fn test_find_view_link_by_href() {
        let html = r#"<a href="/about">About</a><a href="/index.php/rev/article/view/42/77">Read</a>"#;
        assert_eq!(
            find_view_link(html, BASE).as_deref(),
            Some("https://revista.example/index.php/rev/article/view/42/77")
        );
    }

    #[test]
    fn test_find_view_link_by_text() {
        let html = r#"<a href="/reader?id=1">Leer artículo</a>"#;
        assert_eq!(
            find_view_link(html, BASE).as_deref(),
            Some("https://revista.example/reader?id=1")
        );
    }

    #[test]
    fn test_find_view_link_falls_back_to_iframe() {
        let html = r#"<a href="/home">Home</a><iframe src="/fulltext/42"></iframe>"#;
        assert_eq!(
            find_view_link(html, BASE).as_deref(),
            Some("https://revista.example/fulltext/42")
        );
    }

    #[test]
    fn test_find_view_link_object_data_attribute() {
        let html = r#"<object data="https://cdn.example/Full-Text/42"></object>"#;
        assert_eq!(
            find_view_link(html, BASE).as_deref(),
            Some("https://cdn.example/Full-Text/42")
        );
    }

    #[test]
    fn test_find_view_link_none() {
        assert_eq!(find_view_link(r#"<a href="/home">Home</a>"#, BASE), None);
    }

    #[test]
    fn test_extract_download_links_from_view_order_and_dedup() {
        let html = r#"
            <a href="/index.php/rev/article/download/42/77">Descargar</a>
            <a href="/misc">Download this article</a>
            <a href="/index.php/rev/article/download/42/77">again</a>
            <a href="/home">Home</a>
            <iframe src="/viewer/file.pdf"></iframe>
        "#;
        assert_eq!(
            extract_download_links_from_view(html, BASE),
            vec![
                "https://revista.example/index.php/rev/article/download/42/77".to_string(),
                "https://revista.example/misc".to_string(),
                "https://revista.example/viewer/file.pdf".to_string(),
            ]
        );
    }

    #[test]
    fn test_ojs_galley_path_detection() {
        assert!(is_ojs_galley_path("/index.php/rev/article/view/42/77"));
        assert!(is_ojs_galley_path("https://x.example/ARTICLE/VIEW/1/2"));
        assert!(!is_ojs_galley_path("/index.php/rev/article/view/42"));
        assert!(!is_ojs_galley_path("/index.php/rev/article/view/42/pdf"));
        assert!(!is_ojs_galley_path("/index.php/rev/article/view/42/77/"));
    }

    #[test]
    fn test_extract_download_links_none() {
        assert!(extract_download_links_from_view("<p>no links</p>", BASE).is_empty());
    }
}
