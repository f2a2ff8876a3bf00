//! Integration tests for DOI resolution against mock publisher servers.

use std::sync::Arc;

use harvester_core::html::find_direct_pdf_links;
use harvester_core::{
    DiagnosticsDir, DoiResolver, HttpSession, PdfVerifier, ResolutionMethod, ResolverEndpoints,
    Transport,
};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

fn transport() -> Arc<dyn Transport> {
    Arc::new(HttpSession::new().unwrap())
}

fn resolver(doi_server: &MockServer, crossref_server: Option<&MockServer>) -> DoiResolver {
    let crossref_api_base = crossref_server.map_or_else(
        || "https://api.crossref.org".to_string(),
        MockServer::uri,
    );
    DoiResolver::new(transport()).with_endpoints(ResolverEndpoints {
        doi_base_url: doi_server.uri(),
        crossref_api_base,
    })
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body)
}

fn pdf_head() -> ResponseTemplate {
    ResponseTemplate::new(200).insert_header("content-type", "application/pdf")
}

#[tokio::test]
async fn test_crossref_landing_is_swapped_for_article_page() {
    let Some(doi_server) = start_mock_server_or_skip().await else {
        return;
    };
    let Some(crossref) = start_mock_server_or_skip().await else {
        return;
    };
    let Some(journal) = start_mock_server_or_skip().await else {
        return;
    };
    let article = format!("{}/article/42", journal.uri());
    let pdf = format!("{}/files/42.pdf", journal.uri());

    Mock::given(method("GET"))
        .and(path("/10.5555/42"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/v1/works/10.5555/42", crossref.uri()).as_str()),
        )
        .mount(&doi_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/works/10.5555/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"resource": {"primary": {"URL": article}}}
        })))
        .mount(&crossref)
        .await;
    Mock::given(method("GET"))
        .and(path("/article/42"))
        .respond_with(html(&format!(
            r#"<html><head><meta name="citation_pdf_url" content="{pdf}"></head></html>"#
        )))
        .expect(1)
        .mount(&journal)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/files/42.pdf"))
        .respond_with(pdf_head())
        .mount(&journal)
        .await;

    let resolution = resolver(&doi_server, Some(&crossref)).resolve("10.5555/42").await;

    let found = resolution.outcome.expect("Expected a resolved PDF");
    assert_eq!(found.url, pdf);
    assert_eq!(found.method, ResolutionMethod::MetaPdf);
    assert_eq!(found.referer, article);
    let phases = resolution.trace.phases();
    for expected in ["landing", "crossref_api_detected", "crossref_primary_url", "article_page", "outcome"] {
        assert!(phases.contains(&expected), "Expected {expected} in: {phases:?}");
    }
}

#[tokio::test]
async fn test_ojs_viewer_link_resolves_through_download_form() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/10.5555/7"))
        .respond_with(html(r#"<a class="obj_galley_link pdf" href="/index.php/j/article/view/7/12">PDF</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/index.php/j/article/download/7/12"))
        .respond_with(pdf_head())
        .expect(1)
        .mount(&server)
        .await;

    let resolution = resolver(&server, None).resolve("10.5555/7").await;

    let found = resolution.outcome.expect("Expected a resolved PDF");
    assert_eq!(found.method, ResolutionMethod::DirectLinkOjs);
    assert!(found.url.ends_with("/article/download/7/12"), "Expected download URL in: {}", found.url);
}

#[tokio::test]
async fn test_view_page_download_link_sends_referer() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let view = format!("{}/reader/9", server.uri());
    Mock::given(method("GET"))
        .and(path("/10.5555/9"))
        .respond_with(html(r#"<a href="/reader/9">View full text</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reader/9"))
        .respond_with(html(r#"<a href="/get/9">Download</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/get/9"))
        .and(header("referer", view.as_str()))
        .respond_with(pdf_head())
        .expect(1)
        .mount(&server)
        .await;

    let resolution = resolver(&server, None).resolve("10.5555/9").await;

    let found = resolution.outcome.expect("Expected a resolved PDF");
    assert_eq!(found.method, ResolutionMethod::ViewDownload);
    assert_eq!(found.referer, view);
}

#[tokio::test]
async fn test_unreachable_landing_is_unresolved_and_diagnostics_written() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/10.5555/404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let debug_dir = TempDir::new().unwrap();

    let resolution = resolver(&server, None)
        .with_diagnostics(Some(DiagnosticsDir::new(debug_dir.path())))
        .resolve("10.5555/404")
        .await;

    assert!(resolution.outcome.is_none());
    assert_eq!(resolution.trace.phases(), vec!["landing", "outcome"]);
}

#[tokio::test]
async fn test_landing_html_is_saved_for_diagnosis() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/10.5555/1"))
        .respond_with(html("<p>Abstract only</p>"))
        .mount(&server)
        .await;
    let debug_dir = TempDir::new().unwrap();

    let resolution = resolver(&server, None)
        .with_diagnostics(Some(DiagnosticsDir::new(debug_dir.path())))
        .resolve("10.5555/1")
        .await;

    assert!(resolution.outcome.is_none());
    let saved = std::fs::read_to_string(debug_dir.path().join("10.5555_1_landing.html")).unwrap();
    assert!(saved.contains("Abstract only"), "Expected landing body in: {saved}");
}

#[tokio::test]
async fn test_verifier_accepts_signature_behind_html_content_type() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/mislabeled"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_bytes(b"%PDF-1.6\n%binary".to_vec()),
        )
        .mount(&server)
        .await;
    let url = format!("{}/mislabeled", server.uri());

    let verified = PdfVerifier::new(transport()).verify(&url, None, true).await;

    assert!(verified.is_pdf);
    let body = verified.response.expect("Expected an open handle").bytes().await.unwrap();
    assert!(body.starts_with(b"%PDF"));
}

#[test]
fn test_direct_links_same_host_first() {
    let page = r#"<a href="https://mirror.example/paper.pdf">Mirror</a>
        <a href="/files/paper.pdf">Local</a>
        <a href="/files/paper.pdf">Local again</a>"#;
    let links = find_direct_pdf_links(page, "https://journal.example/article/1");
    assert_eq!(
        links,
        vec![
            "https://journal.example/files/paper.pdf".to_string(),
            "https://mirror.example/paper.pdf".to_string(),
        ]
    );
}
