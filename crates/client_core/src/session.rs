//! Stateful orchestration over a [`RagBackend`]: document bookkeeping, the
//! conversation transcript, and the busy/idle activity flag.
//!
//! All mutable state is owned by [`SessionCoordinator`]; frontends drive it
//! from a single control thread and read snapshots back out. The coordinator
//! never shares mutable state with the rendering layer, except for the
//! [`ActivityFlag`], an atomic the UI may clone and poll to drive its
//! "generating response" affordance.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::Utc;
use shared::domain::{
    ConversationTurn, DocumentId, DocumentKind, DocumentRecord, Role, TurnId,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::RagBackend;

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// A previous user-triggered operation has not settled yet. The session
    /// rejects rather than interleaves concurrent requests.
    #[error("another request is still in flight")]
    Busy,
    #[error("document upload failed: {0}")]
    Upload(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("conversation reset failed: {0}")]
    Reset(String),
}

/// Busy/idle gate shared between the coordinator and its frontend.
///
/// Acquisition is scoped: the returned guard clears the flag on drop, so the
/// flag is released on every exit path of an operation, including early
/// returns and panics.
#[derive(Clone, Default)]
pub struct ActivityFlag {
    busy: Arc<AtomicBool>,
}

impl ActivityFlag {
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub(crate) fn try_acquire(&self) -> Option<ActivityGuard> {
        if self.busy.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(ActivityGuard {
                busy: Arc::clone(&self.busy),
            })
        }
    }
}

pub(crate) struct ActivityGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

/// Locally known list of uploaded documents, most recent first.
///
/// A record exists here if and only if its upload call was acknowledged;
/// removal is local bookkeeping and issues no backend call.
#[derive(Default)]
pub struct DocumentRegistry {
    records: Vec<DocumentRecord>,
}

impl DocumentRegistry {
    fn register(&mut self, record: DocumentRecord) {
        self.records.insert(0, record);
    }

    /// No-op when `id` is absent; survivors keep their relative order.
    fn remove(&mut self, id: DocumentId) {
        self.records.retain(|record| record.id != id);
    }

    fn clear(&mut self) {
        self.records.clear();
    }

    pub fn records(&self) -> &[DocumentRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Append-only ordered transcript of user and assistant turns.
#[derive(Default)]
pub struct Transcript {
    turns: Vec<ConversationTurn>,
}

impl Transcript {
    fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Result of a successful upload handshake: the registered record plus the
/// backend's opaque acknowledgement message.
#[derive(Debug, Clone)]
pub struct UploadAck {
    pub record: DocumentRecord,
    pub message: String,
}

/// Settlement of a query submission.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    /// Input was empty after boundary trimming; nothing changed.
    Ignored,
    Answered {
        user: ConversationTurn,
        assistant: ConversationTurn,
    },
    /// The ask call failed. The user turn stays in the transcript; no
    /// assistant turn was appended.
    Failed {
        user: ConversationTurn,
        error: SessionError,
    },
}

/// Parent coordinator owning the registry, the transcript, the activity
/// flag, and the local id counter.
///
/// Exactly one operation may be in flight at a time: every network-touching
/// method acquires the activity flag up front and returns
/// [`SessionError::Busy`] if it is already held. Frontends that process
/// commands one at a time (the desktop worker loop does) will never observe
/// `Busy`, but the gate keeps two in-flight requests from interleaving even
/// if a second dispatch slips through.
pub struct SessionCoordinator {
    backend: Arc<dyn RagBackend>,
    registry: DocumentRegistry,
    transcript: Transcript,
    activity: ActivityFlag,
    next_id: i64,
}

impl SessionCoordinator {
    pub fn new(backend: Arc<dyn RagBackend>) -> Self {
        Self::with_activity_flag(backend, ActivityFlag::default())
    }

    /// Builds the coordinator around a caller-provided flag, so a frontend
    /// can hold its polling handle before the coordinator moves onto its
    /// worker thread.
    pub fn with_activity_flag(backend: Arc<dyn RagBackend>, activity: ActivityFlag) -> Self {
        Self {
            backend,
            registry: DocumentRegistry::default(),
            transcript: Transcript::default(),
            activity,
            next_id: 1,
        }
    }

    pub fn registry(&self) -> &DocumentRegistry {
        &self.registry
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Clone of the shared busy/idle flag for frontend polling.
    pub fn activity_flag(&self) -> ActivityFlag {
        self.activity.clone()
    }

    // Ids are monotonic and never reused, across documents and turns alike.
    fn next_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn append_turn(&mut self, role: Role, text: String, confidence: Option<f64>) -> ConversationTurn {
        let turn = ConversationTurn {
            id: TurnId(self.next_id()),
            role,
            text,
            confidence,
        };
        self.transcript.push(turn.clone());
        turn
    }

    /// Uploads one picked file to the kind-specific endpoint and registers
    /// it on success. Failed uploads leave the registry untouched. File
    /// picking (and picker cancellation, which never reaches this method)
    /// is the frontend's concern. No type or size validation happens here;
    /// unsupported files are a backend-determined failure like any other.
    pub async fn upload_document(
        &mut self,
        kind: DocumentKind,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadAck, SessionError> {
        let _guard = self.activity.try_acquire().ok_or(SessionError::Busy)?;

        match self.backend.upload_document(kind, filename, bytes).await {
            Ok(ack) => {
                let record = DocumentRecord {
                    id: DocumentId(self.next_id()),
                    name: filename.to_string(),
                    kind,
                    registered_at: Utc::now(),
                };
                self.registry.register(record.clone());
                debug!(name = filename, ?kind, "document registered");
                Ok(UploadAck {
                    record,
                    message: ack.message,
                })
            }
            Err(err) => {
                warn!(name = filename, error = %err, "upload failed");
                Err(SessionError::Upload(err.to_string()))
            }
        }
    }

    /// Removes a record from the local view only; the backend keeps the
    /// document indexed. Unknown ids are ignored.
    pub fn remove_document(&mut self, id: DocumentId) {
        self.registry.remove(id);
    }

    /// Submits one query. The user turn is appended before the network call
    /// is dispatched and stays in the transcript whether or not the call
    /// succeeds; an assistant turn is appended only on success, carrying the
    /// backend's literal response text and optional confidence.
    pub async fn submit_query(&mut self, input: &str) -> Result<QueryOutcome, SessionError> {
        let text = input.trim();
        if text.is_empty() {
            return Ok(QueryOutcome::Ignored);
        }

        let _guard = self.activity.try_acquire().ok_or(SessionError::Busy)?;
        let user = self.append_turn(Role::User, text.to_string(), None);

        match self.backend.ask(text).await {
            Ok(answer) => {
                let assistant =
                    self.append_turn(Role::Assistant, answer.response, answer.confidence_score);
                Ok(QueryOutcome::Answered { user, assistant })
            }
            Err(err) => {
                warn!(error = %err, "query failed");
                Ok(QueryOutcome::Failed {
                    user,
                    error: SessionError::Query(err.to_string()),
                })
            }
        }
    }

    /// Commands the backend to discard its corpus, then clears the
    /// transcript AND the document registry regardless of the call's
    /// outcome: a reset invalidates previously indexed documents, so stale
    /// records must not linger looking queryable. Backend failure is
    /// surfaced after the local clear and is safe to tolerate.
    pub async fn reset_conversation(&mut self) -> Result<(), SessionError> {
        let _guard = self.activity.try_acquire().ok_or(SessionError::Busy)?;

        let result = self.backend.reset().await;
        self.transcript.clear();
        self.registry.clear();

        match result {
            Ok(()) => {
                debug!("session reset");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "backend reset failed; local state cleared anyway");
                Err(SessionError::Reset(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
