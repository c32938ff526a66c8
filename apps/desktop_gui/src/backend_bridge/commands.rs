//! Backend commands queued from UI to the backend worker.

use std::path::PathBuf;

use shared::domain::{DocumentId, DocumentKind};

pub enum BackendCommand {
    UploadDocument { kind: DocumentKind, path: PathBuf },
    RemoveDocument { id: DocumentId },
    SubmitQuery { text: String },
    ResetConversation,
}
