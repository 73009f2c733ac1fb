//! Documents held by the vector store.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use recall_embeddings::Embedding;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person chatting.
    User,
    /// The model answering. Older conversations label it `expert`.
    #[serde(alias = "expert")]
    Assistant,
}

impl Role {
    /// Lowercase name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "assistant" | "expert" => Ok(Self::Assistant),
            _ => Err(RetrievalError::InvalidRole(s.to_string())),
        }
    }
}

/// An embedded conversation turn.
///
/// Documents are only created by the vector store and never change once
/// stored.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    /// Unique identifier generated at insert time.
    pub id: String,

    /// Original turn content.
    pub text: String,

    /// Unit-length embedding of `text`.
    pub vector: Embedding,

    /// Insertion time. Non-decreasing within a store.
    pub timestamp: DateTime<Utc>,

    /// Insertion order within a store, breaks timestamp ties.
    pub sequence: u64,

    /// Provenance of the turn.
    pub role: Role,

    /// Id of the chat message this document was built from.
    pub source_message_id: String,
}

/// A search match. The document is shared with the store and read-only.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// The matched document.
    pub document: Arc<Document>,

    /// Cosine similarity to the query.
    pub score: f32,
}

/// A stored chat message, as handed over when switching conversations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Message id.
    pub id: String,

    /// Message content.
    pub text: String,

    /// Who sent it.
    pub role: Role,
}

impl ConversationMessage {
    /// Create a new message.
    pub fn new(id: impl Into<String>, text: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            role,
        }
    }
}
