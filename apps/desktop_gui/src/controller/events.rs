//! Events flowing from the backend worker to the UI thread.
//!
//! The worker owns the authoritative session state; the UI keeps a display
//! mirror that it updates exclusively from these events.

use shared::domain::{ConversationTurn, DocumentId, DocumentRecord};

pub enum UiEvent {
    /// Upload acknowledged; `message` is the backend's opaque ack text.
    DocumentRegistered {
        record: DocumentRecord,
        message: String,
    },
    DocumentRemoved {
        id: DocumentId,
    },
    QueryAnswered {
        user: ConversationTurn,
        assistant: ConversationTurn,
    },
    /// The user turn stays in the transcript; `notice` is shown out of band.
    QueryFailed {
        user: ConversationTurn,
        notice: String,
    },
    /// Transcript and document list were cleared. `notice` is set when the
    /// backend-side reset failed (local state is cleared regardless).
    SessionReset {
        notice: Option<String>,
    },
    /// Generic transient notice (upload failure, worker startup trouble).
    Notice(String),
}
