//! Wire contract with the RAG backend.
//!
//! Four HTTP operations, all POST: `/upload_pdf` and `/upload_image` take a
//! multipart `file` field, `/ask` takes a form-encoded `query` field, and
//! `/reset` takes no body. Only the fields modeled here are consumed; any
//! non-2xx status is treated uniformly as failure without parsing the body.

use serde::{Deserialize, Serialize};

/// Acknowledgement body for both upload endpoints. `message` is opaque
/// display content, never a structured error code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
}

/// Answer body for `/ask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub response: String,
    /// Generator certainty in [0,1]. Older backend revisions omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_response_parses_with_confidence() {
        let body = r#"{"response":"Ferritin is within range.","confidence_score":0.873}"#;
        let parsed: AskResponse = serde_json::from_str(body).expect("parse");
        assert_eq!(parsed.response, "Ferritin is within range.");
        assert_eq!(parsed.confidence_score, Some(0.873));
    }

    #[test]
    fn ask_response_parses_without_confidence() {
        let body = r#"{"response":"No relevant context found."}"#;
        let parsed: AskResponse = serde_json::from_str(body).expect("parse");
        assert_eq!(parsed.confidence_score, None);
    }

    #[test]
    fn ask_response_ignores_unknown_fields() {
        let body = r#"{"response":"ok","confidence_score":0.5,"sources":["a.pdf"]}"#;
        let parsed: AskResponse = serde_json::from_str(body).expect("parse");
        assert_eq!(parsed.response, "ok");
    }
}
