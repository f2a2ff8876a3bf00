//! Crossref API payloads served in place of an article page.
//!
//! Some DOIs resolve straight to `api.crossref.org`; the JSON names the real
//! article URL under `resource.primary.URL` (top level, or inside `message`
//! for the works endpoint).

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct CrossrefEnvelope {
    #[serde(default)]
    resource: Option<CrossrefResource>,
    #[serde(default)]
    message: Option<CrossrefMessage>,
}

#[derive(Debug, Deserialize)]
struct CrossrefMessage {
    #[serde(default)]
    resource: Option<CrossrefResource>,
}

#[derive(Debug, Deserialize)]
struct CrossrefResource {
    #[serde(default)]
    primary: Option<CrossrefPrimary>,
}

#[derive(Debug, Deserialize)]
struct CrossrefPrimary {
    #[serde(rename = "URL", default)]
    url: Option<String>,
}

/// Extracts the primary article URL from a Crossref JSON body.
///
/// Returns `Ok(None)` for valid JSON without a usable URL.
pub(crate) fn primary_article_url(body: &[u8]) -> Result<Option<String>, serde_json::Error> {
    let envelope: CrossrefEnvelope = serde_json::from_slice(body)?;
    let resource = envelope
        .resource
        .or_else(|| envelope.message.and_then(|m| m.resource));
    Ok(resource
        .and_then(|r| r.primary)
        .and_then(|p| p.url)
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty()))
}
