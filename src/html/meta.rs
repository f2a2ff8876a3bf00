//! Meta-tag lookup.

use scraper::Html;
use url::Url;

use super::{absolutize, attr, select_all};

/// Meta `name`/`property` values that carry a PDF URL.
const PDF_META_NAMES: &[&str] = &[
    "citation_pdf_url",
    "pdf_url",
    "og:pdf",
    "dc.identifier.uri",
    "dc.relation.uri",
    "bepress_citation_pdf_url",
    "fulltext_pdf",
];

/// Returns the first PDF URL advertised by `<meta>` or `<link>` elements.
///
/// Meta elements are checked first, in document order: a recognized name
/// wins outright, and any other name containing `pdf` wins when its content
/// ends in `.pdf` or contains `/pdf`. Link elements then qualify when typed
/// `application/pdf`, or when `rel` includes `alternate` and the href
/// mentions `.pdf` or the title mentions `pdf`.
#[must_use]
pub fn find_meta_pdf_url(html: &str, base_url: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let base = Url::parse(base_url).ok();

    for meta in select_all(&document, "meta") {
        let Some(content) = attr(&meta, "content") else {
            continue;
        };
        let name = attr(&meta, "name")
            .or_else(|| attr(&meta, "property"))
            .unwrap_or_default()
            .to_lowercase();
        if name.is_empty() {
            continue;
        }

        let content_lower = content.to_lowercase();
        let recognized = PDF_META_NAMES.contains(&name.as_str());
        let pdf_like = name.contains("pdf")
            && (content_lower.ends_with(".pdf") || content_lower.contains("/pdf"));
        if (recognized || pdf_like)
            && let Some(url) = absolutize(base.as_ref(), content)
        {
            return Some(url);
        }
    }

    for link in select_all(&document, "link[href]") {
        let Some(href) = attr(&link, "href") else {
            continue;
        };
        let link_type = attr(&link, "type").unwrap_or_default().to_lowercase();
        let title = attr(&link, "title").unwrap_or_default().to_lowercase();
        let rel_alternate = attr(&link, "rel")
            .unwrap_or_default()
            .split_whitespace()
            .any(|rel| rel.eq_ignore_ascii_case("alternate"));

        let qualifies = link_type.contains("application/pdf")
            || (rel_alternate && (href.to_lowercase().contains(".pdf") || title.contains("pdf")));
        if qualifies && let Some(url) = absolutize(base.as_ref(), href) {
            return Some(url);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://journal.example/article/42";

    #[test]
    fn test_citation_pdf_url_resolved_against_base() {
        let html = r#"<html><head>
            <meta name="citation_title" content="A paper">
            <meta name="citation_pdf_url" content="/article/42/paper.pdf">
        </head></html>"#;
        assert_eq!(
            find_meta_pdf_url(html, BASE).as_deref(),
            Some("https://journal.example/article/42/paper.pdf")
        );
    }

    #[test]
    fn test_meta_name_match_is_case_insensitive_and_uses_property() {
        let html = r#"<meta property="OG:PDF" content="https://cdn.example/x.pdf">"#;
        assert_eq!(
            find_meta_pdf_url(html, BASE).as_deref(),
            Some("https://cdn.example/x.pdf")
        );
    }

    #[test]
    fn test_unrecognized_pdf_name_requires_pdf_like_content() {
        let html = r#"
            <meta name="custom_pdf_link" content="https://journal.example/landing">
            <meta name="custom_pdf_link" content="https://journal.example/pdf/42">
        "#;
        assert_eq!(
            find_meta_pdf_url(html, BASE).as_deref(),
            Some("https://journal.example/pdf/42")
        );
    }

    #[test]
    fn test_empty_content_is_skipped() {
        let html = r#"<meta name="citation_pdf_url" content="  ">
            <meta name="pdf_url" content="second.pdf">"#;
        assert_eq!(
            find_meta_pdf_url(html, BASE).as_deref(),
            Some("https://journal.example/article/second.pdf")
        );
    }

    #[test]
    fn test_link_typed_application_pdf() {
        let html = r#"<link rel="stylesheet" href="/style.css">
            <link type="application/pdf" href="/download/42">"#;
        assert_eq!(
            find_meta_pdf_url(html, BASE).as_deref(),
            Some("https://journal.example/download/42")
        );
    }

    #[test]
    fn test_alternate_link_with_pdf_title() {
        let html = r#"<link rel="alternate" title="Full text PDF" href="/alt/42">"#;
        assert_eq!(
            find_meta_pdf_url(html, BASE).as_deref(),
            Some("https://journal.example/alt/42")
        );
    }

    #[test]
    fn test_alternate_link_without_pdf_hint_ignored() {
        let html = r#"<link rel="alternate" type="application/rss+xml" href="/feed">"#;
        assert_eq!(find_meta_pdf_url(html, BASE), None);
    }

    #[test]
    fn test_no_candidates() {
        assert_eq!(find_meta_pdf_url("<html><body>nothing</body></html>", BASE), None);
    }
}
