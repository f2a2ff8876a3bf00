//! Direct PDF link lookup.

use scraper::Html;
use url::Url;

use super::{absolutize, attr, contains_any, dedup_preserving_order, select_all, text_lower};

/// Href fragments that make an anchor worth a second look.
const HREF_HINTS: &[&str] = &[".pdf", "download", "descargar", "pdf", "galley", "/article/download"];

/// Link text that confirms a download.
const TEXT_HINTS: &[&str] = &[
    "pdf",
    "download",
    "descargar",
    "texto completo",
    "full text",
    "ver pdf",
    "view pdf",
];

const CLASS_HINTS: &[&str] = &["pdf", "download", "galley"];
const STRONG_HREF_HINTS: &[&str] = &[".pdf", "download", "galley"];

/// Returns anchors that look like PDF downloads, same-host links first.
///
/// An anchor qualifies when its href ends in `.pdf`, when its class names a
/// PDF or galley widget, or when its href carries a download hint that its
/// text, class or href confirms. Each host group is deduplicated.
#[must_use]
pub fn find_direct_pdf_links(html: &str, base_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let base = Url::parse(base_url).ok();
    let base_host = base.as_ref().map(host_key);

    let mut same_host = Vec::new();
    let mut other_host = Vec::new();

    for anchor in select_all(&document, "a[href]") {
        let Some(href) = attr(&anchor, "href") else {
            continue;
        };
        let href_lower = href.to_lowercase();
        let class = anchor.value().attr("class").unwrap_or_default().to_lowercase();

        let qualifies = href_lower.ends_with(".pdf")
            || class.contains("pdf")
            || class.contains("galley")
            || (contains_any(&href_lower, HREF_HINTS)
                && (contains_any(&text_lower(&anchor), TEXT_HINTS)
                    || contains_any(&class, CLASS_HINTS)
                    || contains_any(&href_lower, STRONG_HREF_HINTS)));
        if !qualifies {
            continue;
        }

        let Some(full_url) = absolutize(base.as_ref(), href) else {
            continue;
        };
        let candidate_host = Url::parse(&full_url).ok().map(|u| host_key(&u));
        if candidate_host.is_some() && candidate_host == base_host {
            same_host.push(full_url);
        } else {
            other_host.push(full_url);
        }
    }

    let mut ordered = dedup_preserving_order(same_host);
    ordered.extend(dedup_preserving_order(other_host));
    ordered
}

/// Host plus explicit port, the network location two URLs must share.
fn host_key(url: &Url) -> (Option<String>, Option<u16>) {
    (url.host_str().map(str::to_ascii_lowercase), url.port())
}
