use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(DocumentId);
id_newtype!(TurnId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// A document the user successfully uploaded to the backend index.
///
/// Records exist only for acknowledged uploads; a failed upload never
/// produces one. Removal is local bookkeeping only and does not retract
/// the document from the backend index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub name: String,
    pub kind: DocumentKind,
    pub registered_at: DateTime<Utc>,
}

/// One entry in the conversation transcript. Turns are append-only and
/// never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: TurnId,
    pub role: Role,
    pub text: String,
    /// Backend certainty in [0,1]; only ever set on assistant turns, and
    /// only when the backend supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}
