//! Client-side orchestration core for the medical document RAG desktop app.
//!
//! The [`RagBackend`] trait is the full remote contract: two upload
//! endpoints, one ask endpoint, one reset endpoint. [`HttpRagBackend`] is
//! the production transport; the [`session`] module layers the stateful
//! orchestration (document registry, transcript, activity flag) on top of
//! any backend implementation, which keeps the core testable without a
//! rendering environment or a live server.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{multipart, Client};
use shared::{
    domain::DocumentKind,
    protocol::{AskResponse, UploadResponse},
};
use tracing::debug;

pub mod session;

pub use session::{
    ActivityFlag, DocumentRegistry, QueryOutcome, SessionCoordinator, SessionError, Transcript,
    UploadAck,
};

/// The four remote operations the backend collaborator must provide.
///
/// Implementations return `anyhow::Result`; any transport failure or non-2xx
/// status is uniform failure. The coordinator converts these into typed
/// [`SessionError`]s at the call site; nothing below this trait branches on
/// status codes or parses error bodies.
#[async_trait]
pub trait RagBackend: Send + Sync {
    /// Sends raw file bytes as multipart field `file` to the kind-specific
    /// upload endpoint.
    async fn upload_document(
        &self,
        kind: DocumentKind,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse>;

    /// Sends the query as form field `query` to the ask endpoint.
    async fn ask(&self, query: &str) -> Result<AskResponse>;

    /// Asks the backend to discard its indexed corpus and session state.
    async fn reset(&self) -> Result<()>;
}

/// HTTP transport for [`RagBackend`] over `reqwest`.
pub struct HttpRagBackend {
    http: Client,
    server_url: String,
}

impl HttpRagBackend {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            server_url: server_url.into(),
        }
    }

    fn upload_path(kind: DocumentKind) -> &'static str {
        match kind {
            DocumentKind::Pdf => "/upload_pdf",
            DocumentKind::Image => "/upload_image",
        }
    }
}

#[async_trait]
impl RagBackend for HttpRagBackend {
    async fn upload_document(
        &self,
        kind: DocumentKind,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse> {
        let part = multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = multipart::Form::new().part("file", part);
        let res = self
            .http
            .post(format!("{}{}", self.server_url, Self::upload_path(kind)))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;
        let ack: UploadResponse = res.json().await?;
        debug!(?kind, filename, "upload acknowledged");
        Ok(ack)
    }

    async fn ask(&self, query: &str) -> Result<AskResponse> {
        let res = self
            .http
            .post(format!("{}/ask", self.server_url))
            .form(&[("query", query)])
            .send()
            .await?
            .error_for_status()?;
        let answer: AskResponse = res.json().await?;
        debug!(
            confidence = ?answer.confidence_score,
            "answer received"
        );
        Ok(answer)
    }

    async fn reset(&self) -> Result<()> {
        self.http
            .post(format!("{}/reset", self.server_url))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
