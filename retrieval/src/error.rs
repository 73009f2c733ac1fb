//! Error types for the context retriever.

use thiserror::Error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur in the context retriever.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Embedding error, including provider initialization failures.
    #[error("embedding error: {0}")]
    Embedding(#[from] recall_embeddings::EmbeddingError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Unknown message role.
    #[error("unknown role: {0}")]
    InvalidRole(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RetrievalError {
    /// Whether this error means the embedding model could not be acquired.
    pub fn is_init_failure(&self) -> bool {
        matches!(self, Self::Embedding(e) if e.is_init_failure())
    }
}
