//! Error types for the embeddings system.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur in the embeddings system.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// The model could not be acquired (network, resource, or corruption failure).
    #[error("failed to initialize embedding provider `{provider}`: {reason}")]
    ProviderInit { provider: String, reason: String },

    /// Provider not configured.
    #[error("embedding provider not configured")]
    ProviderNotConfigured,

    /// API request failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// Invalid response from provider.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The provider did not answer within the configured timeout.
    #[error("embedding timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The provider returned a vector with no components.
    #[error("provider returned an empty embedding")]
    EmptyEmbedding,

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl EmbeddingError {
    /// Build a [`EmbeddingError::ProviderInit`] for the named provider.
    pub fn init(provider: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ProviderInit {
            provider: provider.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error means the feature as a whole is unavailable.
    pub fn is_init_failure(&self) -> bool {
        matches!(self, Self::ProviderInit { .. })
    }
}
