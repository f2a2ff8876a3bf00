//! Signature-based PDF verification.
//!
//! A candidate URL is accepted when the server declares `application/pdf`
//! (on a HEAD probe or on the full fetch) or when the body starts with the
//! `%PDF` signature. Transport failures are never propagated; they simply
//! mean "not a PDF".

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::transport::{
    FetchError, FetchRequest, FetchResponse, MemoryBody, PDF_ACCEPT, Transport,
};

/// Leading bytes of every PDF file.
pub const PDF_SIGNATURE: &[u8] = b"%PDF";

/// Number of bytes inspected when sniffing a streamed body.
const SNIFF_LEN: usize = 5;

/// Result of verifying one URL.
#[derive(Debug)]
pub struct VerifiedPdf {
    /// Whether the resource is a PDF.
    pub is_pdf: bool,
    /// URL after redirects, set only when `is_pdf`.
    pub final_url: Option<String>,
    /// Open response positioned at the start of the body, when one survived
    /// verification. `None` with `is_pdf` means the caller must re-request.
    pub response: Option<FetchResponse>,
}

impl VerifiedPdf {
    fn rejected() -> Self {
        Self {
            is_pdf: false,
            final_url: None,
            response: None,
        }
    }

    fn accepted(final_url: String, response: Option<FetchResponse>) -> Self {
        Self {
            is_pdf: true,
            final_url: Some(final_url),
            response,
        }
    }
}

/// Decides whether URLs point at real PDFs.
#[derive(Clone)]
pub struct PdfVerifier {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for PdfVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfVerifier").finish_non_exhaustive()
    }
}

impl PdfVerifier {
    /// Creates a verifier over the given transport.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Verifies `url`, sending `referer` when known.
    ///
    /// With `streaming` the body is sniffed rather than buffered. When the
    /// transport cannot peek, the sniffed bytes are consumed, the response is
    /// closed, and a positive result carries no handle.
    #[instrument(level = "debug", skip(self, referer), fields(url = %url))]
    pub async fn verify(&self, url: &str, referer: Option<&str>, streaming: bool) -> VerifiedPdf {
        match self.try_verify(url, referer, streaming).await {
            Ok(result) => {
                debug!(is_pdf = result.is_pdf, "verification finished");
                result
            }
            Err(error) => {
                debug!(error = %error, "verification failed with transport error");
                VerifiedPdf::rejected()
            }
        }
    }

    async fn try_verify(
        &self,
        url: &str,
        referer: Option<&str>,
        streaming: bool,
    ) -> Result<VerifiedPdf, FetchError> {
        let head = FetchRequest::head(url)
            .with_referer(referer)
            .with_accept(PDF_ACCEPT);
        match self.transport.send(&head).await {
            Ok(response) if response.declares_pdf() => {
                debug!(final_url = %response.final_url, "HEAD declares PDF");
                return Ok(VerifiedPdf::accepted(response.final_url, None));
            }
            Ok(_) => {}
            Err(error) => debug!(error = %error, "HEAD probe failed, falling back to GET"),
        }

        let get = FetchRequest::get(url)
            .with_referer(referer)
            .with_accept(PDF_ACCEPT);
        let mut response = self.transport.send(&get).await?;
        if !response.is_success() {
            debug!(status = response.status, "GET returned non-success status");
            return Ok(VerifiedPdf::rejected());
        }

        let final_url = response.final_url.clone();
        if response.declares_pdf() {
            return Ok(VerifiedPdf::accepted(final_url, Some(response)));
        }

        if !streaming {
            let status = response.status;
            let headers = response.headers.clone();
            let bytes = response.bytes().await?;
            if !bytes.starts_with(PDF_SIGNATURE) {
                return Ok(VerifiedPdf::rejected());
            }
            let buffered = FetchResponse {
                status,
                final_url: final_url.clone(),
                headers,
                body: Box::new(MemoryBody::new(bytes)),
            };
            return Ok(VerifiedPdf::accepted(final_url, Some(buffered)));
        }

        if let Some(prefix) = response.body.peek(SNIFF_LEN).await? {
            return Ok(if prefix.starts_with(PDF_SIGNATURE) {
                VerifiedPdf::accepted(final_url, Some(response))
            } else {
                VerifiedPdf::rejected()
            });
        }

        let mut prefix = Vec::with_capacity(SNIFF_LEN);
        while prefix.len() < SNIFF_LEN {
            match response.body.chunk().await? {
                Some(chunk) => prefix.extend_from_slice(&chunk),
                None => break,
            }
        }
        drop(response);
        if prefix.starts_with(PDF_SIGNATURE) {
            debug!("signature matched after destructive read, caller must re-request");
            Ok(VerifiedPdf::accepted(final_url, None))
        } else {
            Ok(VerifiedPdf::rejected())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::fake_transport::{Canned, ScriptedTransport};
    use crate::transport::FetchMethod;

    const URL: &str = "https://journal.example/paper";

    fn verifier(transport: &Arc<ScriptedTransport>) -> PdfVerifier {
        PdfVerifier::new(Arc::clone(transport) as Arc<dyn Transport>)
    }

    #[tokio::test]
    async fn test_head_declaring_pdf_skips_get() {
        let transport = Arc::new(
            ScriptedTransport::new().on_head(
                URL,
                Canned::ok("application/pdf", Vec::new()).redirected_to("https://cdn.example/p.pdf"),
            ),
        );
        let result = verifier(&transport).verify(URL, None, false).await;

        assert!(result.is_pdf);
        assert_eq!(result.final_url.as_deref(), Some("https://cdn.example/p.pdf"));
        assert!(result.response.is_none());
        assert!(transport.requested_urls(FetchMethod::Get).is_empty());
    }

    #[tokio::test]
    async fn test_html_content_type_with_pdf_signature_is_pdf() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_head(URL, Canned::html(""))
                .on_get(URL, Canned::ok("text/html", b"%PDF-1.5 rest".to_vec())),
        );
        let result = verifier(&transport).verify(URL, None, false).await;

        assert!(result.is_pdf);
        let body = result.response.unwrap().bytes().await.unwrap();
        assert_eq!(body, b"%PDF-1.5 rest");
    }

    #[tokio::test]
    async fn test_pdf_content_type_with_empty_body_is_pdf_without_reading() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_head(URL, Canned::status(405))
                .on_get(URL, Canned::ok("application/pdf", Vec::new())),
        );
        let result = verifier(&transport).verify(URL, None, true).await;

        assert!(result.is_pdf);
        assert!(result.response.is_some());
        assert_eq!(transport.body_reads(), 0);
    }

    #[tokio::test]
    async fn test_html_body_is_rejected() {
        let transport = Arc::new(
            ScriptedTransport::new().on_get(URL, Canned::html("<html>login</html>")),
        );
        let result = verifier(&transport).verify(URL, None, false).await;
        assert!(!result.is_pdf);
        assert!(result.final_url.is_none());
    }

    #[tokio::test]
    async fn test_non_success_status_is_rejected() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_get(URL, Canned::ok("text/plain", b"%PDF".to_vec()).with_status(403)),
        );
        let result = verifier(&transport).verify(URL, None, false).await;
        assert!(!result.is_pdf);
    }

    #[tokio::test]
    async fn test_transport_error_reports_not_pdf() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_head(URL, Canned::transport_error())
                .on_get(URL, Canned::transport_error()),
        );
        let result = verifier(&transport).verify(URL, None, true).await;
        assert!(!result.is_pdf);
        assert!(result.response.is_none());
    }

    #[tokio::test]
    async fn test_streaming_peek_keeps_handle_intact() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_get(URL, Canned::ok("application/octet-stream", b"%PDF-1.7 data".to_vec())),
        );
        let result = verifier(&transport).verify(URL, None, true).await;

        assert!(result.is_pdf);
        let body = result.response.unwrap().bytes().await.unwrap();
        assert_eq!(body, b"%PDF-1.7 data");
    }

    #[tokio::test]
    async fn test_streaming_without_peek_closes_and_requires_rerequest() {
        let transport = Arc::new(ScriptedTransport::new().on_get(
            URL,
            Canned::ok("application/octet-stream", b"%PDF\n".to_vec()).without_peek(),
        ));
        let result = verifier(&transport).verify(URL, None, true).await;

        assert!(result.is_pdf);
        assert_eq!(result.final_url.as_deref(), Some(URL));
        assert!(result.response.is_none());
        assert_eq!(transport.body_reads(), 1);
    }

    #[tokio::test]
    async fn test_streaming_without_peek_rejects_non_pdf_prefix() {
        let transport = Arc::new(ScriptedTransport::new().on_get(
            URL,
            Canned::ok("application/octet-stream", b"<html>".to_vec()).without_peek(),
        ));
        let result = verifier(&transport).verify(URL, None, true).await;
        assert!(!result.is_pdf);
    }

    #[tokio::test]
    async fn test_referer_and_pdf_accept_are_sent() {
        let transport = Arc::new(
            ScriptedTransport::new().on_head(URL, Canned::ok("application/pdf", Vec::new())),
        );
        verifier(&transport)
            .verify(URL, Some("https://journal.example/landing"), false)
            .await;

        let requests = transport.requests();
        assert_eq!(requests[0].referer.as_deref(), Some("https://journal.example/landing"));
        assert_eq!(requests[0].accept, Some(PDF_ACCEPT));
    }
}
