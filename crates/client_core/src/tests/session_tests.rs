use std::{collections::VecDeque, sync::Arc};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::protocol::{AskResponse, UploadResponse};
use tokio::sync::Mutex;

use super::*;

enum ScriptedAnswer {
    Ok(AskResponse),
    Err(String),
}

fn answer(text: &str, confidence: Option<f64>) -> ScriptedAnswer {
    ScriptedAnswer::Ok(AskResponse {
        response: text.to_string(),
        confidence_score: confidence,
    })
}

struct TestRagBackend {
    answers: Mutex<VecDeque<ScriptedAnswer>>,
    fail_uploads: Option<String>,
    fail_reset: Option<String>,
    asked: Mutex<Vec<String>>,
    uploads: Mutex<Vec<(DocumentKind, String, usize)>>,
    resets: Mutex<u32>,
}

impl TestRagBackend {
    fn new() -> Self {
        Self {
            answers: Mutex::new(VecDeque::new()),
            fail_uploads: None,
            fail_reset: None,
            asked: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            resets: Mutex::new(0),
        }
    }

    fn with_answers(answers: Vec<ScriptedAnswer>) -> Self {
        let backend = Self::new();
        *backend.answers.try_lock().expect("fresh backend") = answers.into();
        backend
    }

    fn with_failing_uploads(mut self, message: &str) -> Self {
        self.fail_uploads = Some(message.to_string());
        self
    }

    fn with_failing_reset(mut self, message: &str) -> Self {
        self.fail_reset = Some(message.to_string());
        self
    }
}

#[async_trait]
impl RagBackend for TestRagBackend {
    async fn upload_document(
        &self,
        kind: DocumentKind,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse> {
        if let Some(err) = &self.fail_uploads {
            return Err(anyhow!(err.clone()));
        }
        self.uploads
            .lock()
            .await
            .push((kind, filename.to_string(), bytes.len()));
        Ok(UploadResponse {
            message: format!("indexed {filename}"),
        })
    }

    async fn ask(&self, query: &str) -> Result<AskResponse> {
        self.asked.lock().await.push(query.to_string());
        match self.answers.lock().await.pop_front() {
            Some(ScriptedAnswer::Ok(answer)) => Ok(answer),
            Some(ScriptedAnswer::Err(err)) => Err(anyhow!(err)),
            None => Err(anyhow!("no scripted answer left")),
        }
    }

    async fn reset(&self) -> Result<()> {
        *self.resets.lock().await += 1;
        if let Some(err) = &self.fail_reset {
            return Err(anyhow!(err.clone()));
        }
        Ok(())
    }
}

fn session_over(backend: Arc<TestRagBackend>) -> SessionCoordinator {
    SessionCoordinator::new(backend)
}

#[tokio::test]
async fn registry_orders_successful_uploads_most_recent_first() {
    let backend = Arc::new(TestRagBackend::new());
    let mut session = session_over(backend.clone());

    session
        .upload_document(DocumentKind::Pdf, "labs.pdf", b"pdf".to_vec())
        .await
        .expect("upload");
    session
        .upload_document(DocumentKind::Image, "scan.png", b"png".to_vec())
        .await
        .expect("upload");

    let names: Vec<&str> = session
        .registry()
        .records()
        .iter()
        .map(|record| record.name.as_str())
        .collect();
    assert_eq!(names, ["scan.png", "labs.pdf"]);
    assert_eq!(session.registry().records()[0].kind, DocumentKind::Image);
    assert_eq!(backend.uploads.lock().await.len(), 2);
    assert!(!session.activity_flag().is_busy());
}

#[tokio::test]
async fn failed_upload_leaves_registry_unchanged() {
    let backend = Arc::new(TestRagBackend::new().with_failing_uploads("file too large"));
    let mut session = session_over(backend);

    let err = session
        .upload_document(DocumentKind::Pdf, "huge.pdf", vec![0; 16])
        .await
        .expect_err("must fail");

    assert!(matches!(err, SessionError::Upload(_)));
    assert!(err.to_string().contains("file too large"));
    assert!(session.registry().is_empty());
    assert!(!session.activity_flag().is_busy());
}

#[tokio::test]
async fn removing_a_document_preserves_survivor_order() {
    let backend = Arc::new(TestRagBackend::new());
    let mut session = session_over(backend);

    for name in ["a.pdf", "b.pdf", "c.pdf"] {
        session
            .upload_document(DocumentKind::Pdf, name, b"pdf".to_vec())
            .await
            .expect("upload");
    }

    let middle = session.registry().records()[1].id;
    session.remove_document(middle);

    let names: Vec<&str> = session
        .registry()
        .records()
        .iter()
        .map(|record| record.name.as_str())
        .collect();
    assert_eq!(names, ["c.pdf", "a.pdf"]);

    // Unknown ids are silently ignored.
    session.remove_document(middle);
    assert_eq!(session.registry().len(), 2);
}

#[tokio::test]
async fn document_ids_are_never_reused() {
    let backend = Arc::new(TestRagBackend::new());
    let mut session = session_over(backend);

    session
        .upload_document(DocumentKind::Pdf, "first.pdf", b"pdf".to_vec())
        .await
        .expect("upload");
    let first = session.registry().records()[0].id;
    session.remove_document(first);

    let ack = session
        .upload_document(DocumentKind::Pdf, "second.pdf", b"pdf".to_vec())
        .await
        .expect("upload");
    assert_ne!(ack.record.id, first);
}

#[tokio::test]
async fn empty_query_is_a_silent_noop() {
    let backend = Arc::new(TestRagBackend::new());
    let mut session = session_over(backend.clone());

    let outcome = session.submit_query("   \t  ").await.expect("submit");

    assert!(matches!(outcome, QueryOutcome::Ignored));
    assert!(session.transcript().is_empty());
    assert!(backend.asked.lock().await.is_empty());
    assert!(!session.activity_flag().is_busy());
}

#[tokio::test]
async fn successful_query_appends_user_then_assistant() {
    let backend = Arc::new(TestRagBackend::with_answers(vec![answer(
        "The value is normal.",
        Some(0.42),
    )]));
    let mut session = session_over(backend.clone());

    let outcome = session
        .submit_query("  what about   my results?  ")
        .await
        .expect("submit");

    let turns = session.transcript().turns();
    assert_eq!(turns.len(), 2);
    // Boundary whitespace trimmed, interior whitespace untouched.
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[0].text, "what about   my results?");
    assert_eq!(turns[0].confidence, None);
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(turns[1].text, "The value is normal.");
    assert_eq!(turns[1].confidence, Some(0.42));
    assert!(turns[0].id.0 < turns[1].id.0);
    assert_eq!(
        backend.asked.lock().await.as_slice(),
        ["what about   my results?"]
    );
    assert!(matches!(outcome, QueryOutcome::Answered { .. }));
    assert!(!session.activity_flag().is_busy());
}

#[tokio::test]
async fn failed_query_keeps_user_turn_only() {
    let backend = Arc::new(TestRagBackend::with_answers(vec![ScriptedAnswer::Err(
        "connection timed out".to_string(),
    )]));
    let mut session = session_over(backend);

    let outcome = session.submit_query("did it work?").await.expect("submit");

    match outcome {
        QueryOutcome::Failed { user, error } => {
            assert_eq!(user.text, "did it work?");
            assert!(matches!(error, SessionError::Query(_)));
            assert!(error.to_string().contains("connection timed out"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    let turns = session.transcript().turns();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].role, Role::User);
    assert!(!session.activity_flag().is_busy());
}

#[tokio::test]
async fn back_to_back_submissions_keep_submission_order() {
    let backend = Arc::new(TestRagBackend::with_answers(vec![
        answer("first answer", None),
        answer("second answer", None),
    ]));
    let mut session = session_over(backend);

    session.submit_query("first question").await.expect("submit");
    session
        .submit_query("second question")
        .await
        .expect("submit");

    let texts: Vec<&str> = session
        .transcript()
        .turns()
        .iter()
        .map(|turn| turn.text.as_str())
        .collect();
    assert_eq!(
        texts,
        [
            "first question",
            "first answer",
            "second question",
            "second answer"
        ]
    );
    let ids: Vec<i64> = session
        .transcript()
        .turns()
        .iter()
        .map(|turn| turn.id.0)
        .collect();
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn busy_session_rejects_concurrent_operations() {
    let backend = Arc::new(TestRagBackend::new());
    let mut session = session_over(backend);
    let flag = session.activity_flag();

    let guard = flag.try_acquire().expect("idle flag");
    assert!(flag.is_busy());

    assert!(matches!(
        session.submit_query("second request").await,
        Err(SessionError::Busy)
    ));
    assert!(matches!(
        session
            .upload_document(DocumentKind::Pdf, "x.pdf", b"pdf".to_vec())
            .await,
        Err(SessionError::Busy)
    ));
    assert!(matches!(
        session.reset_conversation().await,
        Err(SessionError::Busy)
    ));
    // A rejected submission records nothing.
    assert!(session.transcript().is_empty());

    drop(guard);
    assert!(!flag.is_busy());
}

#[tokio::test]
async fn reset_clears_transcript_and_registry_and_is_idempotent() {
    let backend = Arc::new(TestRagBackend::with_answers(vec![answer("ok", None)]));
    let mut session = session_over(backend.clone());

    session
        .upload_document(DocumentKind::Pdf, "labs.pdf", b"pdf".to_vec())
        .await
        .expect("upload");
    session.submit_query("anything?").await.expect("submit");

    session.reset_conversation().await.expect("reset");
    assert!(session.transcript().is_empty());
    assert!(session.registry().is_empty());

    // Second reset on an already-empty session is a harmless no-op locally.
    session.reset_conversation().await.expect("reset");
    assert!(session.transcript().is_empty());
    assert_eq!(*backend.resets.lock().await, 2);
    assert!(!session.activity_flag().is_busy());
}

#[tokio::test]
async fn reset_failure_still_clears_local_state() {
    let backend = Arc::new(
        TestRagBackend::with_answers(vec![answer("ok", None)]).with_failing_reset("backend down"),
    );
    let mut session = session_over(backend);

    session
        .upload_document(DocumentKind::Image, "scan.png", b"png".to_vec())
        .await
        .expect("upload");
    session.submit_query("anything?").await.expect("submit");

    let err = session
        .reset_conversation()
        .await
        .expect_err("reset must surface the failure");
    assert!(matches!(err, SessionError::Reset(_)));
    assert!(session.transcript().is_empty());
    assert!(session.registry().is_empty());
    assert!(!session.activity_flag().is_busy());
}

#[tokio::test]
async fn ferritin_question_over_one_indexed_pdf() {
    let backend = Arc::new(TestRagBackend::with_answers(vec![answer(
        "Your Ferritin is 85 ng/mL, within the normal range.",
        Some(0.91),
    )]));
    let mut session = session_over(backend);

    session
        .upload_document(DocumentKind::Pdf, "labs.pdf", b"%PDF".to_vec())
        .await
        .expect("upload");
    assert_eq!(session.registry().len(), 1);

    session
        .submit_query("Is my Ferritin level normal?")
        .await
        .expect("submit");

    let turns = session.transcript().turns();
    assert_eq!(turns[0].text, "Is my Ferritin level normal?");
    assert_eq!(
        turns[1].text,
        "Your Ferritin is 85 ng/mL, within the normal range."
    );
    assert_eq!(turns[1].confidence, Some(0.91));
}
