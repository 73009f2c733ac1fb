//! Configuration for the context retriever.
//!
//! Every field has a default, so a TOML file only needs the values it
//! changes:
//!
//! ```toml
//! max_documents = 500
//!
//! [search]
//! top_k = 4
//!
//! [embedding]
//! provider = "hashing"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::budget::ContextBudget;
use crate::error::{Result, RetrievalError};

/// Maximum number of documents held by the vector store.
pub const MAX_DOCUMENTS: usize = 1000;

/// Total token budget for retrieved context.
pub const MAX_CONTEXT_TOKENS: usize = 3000;

/// Token-equivalents reserved for prompt framing around the context.
pub const CONTEXT_OVERHEAD_TOKENS: usize = 300;

/// Fraction of the budget held back because token counts are estimates.
pub const CONTEXT_SAFETY_MARGIN: f64 = 0.10;

/// Approximate tokens per character.
pub const AVG_TOKENS_PER_CHAR: f64 = 0.25;

/// Number of search results considered for the context.
pub const DEFAULT_TOP_K: usize = 6;

/// Minimum cosine similarity for a search result to be considered.
pub const DEFAULT_MIN_SCORE: f32 = 0.35;

/// Number of top results folded into the fallback summary.
pub const SUMMARY_MAX_RESULTS: usize = 3;

/// Maximum characters of result text in the fallback summary.
pub const SUMMARY_MAX_CHARS: usize = 500;

/// Configuration for the context retriever.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Capacity of the vector store.
    pub max_documents: usize,

    /// Token budget for assembled context.
    pub budget: ContextBudget,

    /// Search parameters.
    pub search: SearchConfig,

    /// Fallback summary limits.
    pub summary: SummaryConfig,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,
}

impl RetrievalConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            max_documents: MAX_DOCUMENTS,
            budget: ContextBudget::default(),
            search: SearchConfig::default(),
            summary: SummaryConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }

    /// Parse and validate a TOML configuration.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading retrieval config from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Set the vector store capacity.
    pub fn with_max_documents(mut self, max_documents: usize) -> Self {
        self.max_documents = max_documents;
        self
    }

    /// Set the context budget.
    pub fn with_budget(mut self, budget: ContextBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Set the search configuration.
    pub fn with_search(mut self, config: SearchConfig) -> Self {
        self.search = config;
        self
    }

    /// Set the embedding configuration.
    pub fn with_embedding(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }

    /// Reject values the retriever cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_documents == 0 {
            return Err(RetrievalError::Config(
                "max_documents must be at least 1".to_string(),
            ));
        }
        if !(-1.0..=1.0).contains(&self.search.min_score) {
            return Err(RetrievalError::Config(format!(
                "search.min_score must be within [-1, 1], got {}",
                self.search.min_score
            )));
        }
        if !(0.0..1.0).contains(&self.budget.safety_margin) {
            return Err(RetrievalError::Config(format!(
                "budget.safety_margin must be within [0, 1), got {}",
                self.budget.safety_margin
            )));
        }
        let ratio = self.budget.tokens_per_char;
        if ratio.is_nan() || ratio <= 0.0 {
            return Err(RetrievalError::Config(format!(
                "budget.tokens_per_char must be positive, got {ratio}"
            )));
        }
        if self.embedding.dimension == Some(0) {
            return Err(RetrievalError::Config(
                "embedding.dimension must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of results to consider.
    pub top_k: usize,

    /// Minimum similarity score (-1.0 to 1.0).
    pub min_score: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            min_score: DEFAULT_MIN_SCORE,
        }
    }
}

/// Limits for the summary produced when no result fits the budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Number of top results to draw text from.
    pub max_results: usize,

    /// Maximum characters of result text.
    pub max_chars: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_results: SUMMARY_MAX_RESULTS,
            max_chars: SUMMARY_MAX_CHARS,
        }
    }
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which provider to use.
    pub provider: EmbeddingProviderType,

    /// Model to use for embeddings. Provider default when unset.
    pub model: Option<String>,

    /// Base URL of an OpenAI-compatible API.
    pub base_url: Option<String>,

    /// API key. Falls back to `OPENAI_API_KEY` when unset.
    pub api_key: Option<String>,

    /// Output dimension for the hashing provider.
    pub dimension: Option<usize>,

    /// Whether to cache embeddings.
    pub cache_enabled: bool,

    /// Maximum cache size.
    pub cache_max_entries: usize,

    /// Upper bound on a single embedding call, including a lazy model load,
    /// in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::default(),
            model: None,
            base_url: None,
            api_key: None,
            dimension: None,
            cache_enabled: true,
            cache_max_entries: 2000,
            timeout_ms: Some(30_000),
        }
    }
}

/// Type of embedding provider.
///
/// Defaults to [`EmbeddingProviderType::Local`] when the `local-embeddings`
/// feature is compiled in, and to [`EmbeddingProviderType::OpenAI`] otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// OpenAI embeddings API.
    #[serde(rename = "open_ai", alias = "openai")]
    OpenAI,
    /// Deterministic bag-of-words hashing, no model required.
    Hashing,
    /// Local embedding model.
    Local,
    /// No embeddings. Building a retriever fails.
    None,
}

impl Default for EmbeddingProviderType {
    fn default() -> Self {
        if cfg!(feature = "local-embeddings") {
            Self::Local
        } else {
            Self::OpenAI
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_match_constants() {
        let config = RetrievalConfig::default();
        assert_eq!(config.max_documents, 1000);
        assert_eq!(config.budget.max_context_tokens, 3000);
        assert_eq!(config.search.top_k, 6);
        assert_eq!(config.search.min_score, 0.35);
        assert_eq!(config.summary.max_chars, 500);
        assert_eq!(config.embedding.provider, EmbeddingProviderType::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_provider_follows_local_feature() {
        let expected = if cfg!(feature = "local-embeddings") {
            EmbeddingProviderType::Local
        } else {
            EmbeddingProviderType::OpenAI
        };
        assert_eq!(EmbeddingProviderType::default(), expected);

        let config = RetrievalConfig::from_toml_str("[embedding]\ncache_enabled = false").unwrap();
        assert_eq!(config.embedding.provider, expected);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RetrievalConfig::from_toml_str(
            r#"
            max_documents = 50

            [search]
            min_score = 0.5

            [embedding]
            provider = "hashing"
            dimension = 64
            "#,
        )
        .unwrap();

        assert_eq!(config.max_documents, 50);
        assert_eq!(config.search.min_score, 0.5);
        assert_eq!(config.search.top_k, DEFAULT_TOP_K);
        assert_eq!(config.embedding.provider, EmbeddingProviderType::Hashing);
        assert_eq!(config.embedding.dimension, Some(64));
        assert_eq!(config.budget.overhead_tokens, CONTEXT_OVERHEAD_TOKENS);
    }

    #[test]
    fn test_open_ai_provider_name() {
        for name in ["open_ai", "openai"] {
            let config =
                RetrievalConfig::from_toml_str(&format!("[embedding]\nprovider = \"{name}\"")).unwrap();
            assert_eq!(config.embedding.provider, EmbeddingProviderType::OpenAI);
        }
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = RetrievalConfig::from_toml_str("max_documents = 0").unwrap_err();
        assert!(matches!(err, RetrievalError::Config(_)));

        let err = RetrievalConfig::from_toml_str("[search]\nmin_score = 1.5").unwrap_err();
        assert!(matches!(err, RetrievalError::Config(_)));

        let err = RetrievalConfig::from_toml_str("[budget]\nsafety_margin = 1.0").unwrap_err();
        assert!(matches!(err, RetrievalError::Config(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let err = RetrievalConfig::from_toml_str("max_documents = \"many\"").unwrap_err();
        assert!(matches!(err, RetrievalError::ConfigParse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recall.toml");
        std::fs::write(&path, "[summary]\nmax_results = 2\n").unwrap();

        let config = RetrievalConfig::load(&path).unwrap();
        assert_eq!(config.summary.max_results, 2);

        let missing = RetrievalConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, RetrievalError::Io(_)));
    }
}
