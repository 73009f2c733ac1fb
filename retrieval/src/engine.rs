//! Context retriever implementation.

use std::sync::Arc;
use std::time::Duration;

use recall_embeddings::{
    Embedder, EmbeddingCache, EmbeddingProvider, HashingProvider, OpenAIProvider,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::budget::{CharRatioEstimator, TokenEstimator, pack, summarize};
use crate::config::{EmbeddingConfig, EmbeddingProviderType, RetrievalConfig};
use crate::context::{RelevantMessage, RetrievedContext};
use crate::document::{ConversationMessage, Role};
use crate::error::{Result, RetrievalError};
use crate::store::VectorStore;

/// Semantic memory over a conversation.
///
/// This is the entry point the chat application talks to. It records
/// turns, finds the ones relevant to a new query, and fits them into a
/// token budget.
///
/// Memory writes and context lookups are best effort: failures are logged
/// and never reach the caller. Only acquiring the embedding model, through
/// [`ContextRetriever::initialize`] or
/// [`ContextRetriever::rehydrate_from_messages`], reports an error.
pub struct ContextRetriever {
    /// Configuration.
    config: RetrievalConfig,

    /// Embedded conversation turns.
    store: VectorStore,

    /// Token cost estimator used for budgeting.
    estimator: Box<dyn TokenEstimator>,
}

impl ContextRetriever {
    /// Create a new retriever builder.
    pub fn builder() -> ContextRetrieverBuilder {
        ContextRetrieverBuilder::new()
    }

    /// Create a retriever from configuration.
    pub fn new(config: RetrievalConfig) -> Result<Self> {
        Self::builder().with_config(config).build()
    }

    /// The active configuration.
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Acquire the embedding model. Safe to call repeatedly and
    /// concurrently; the model is loaded once.
    pub async fn initialize(&self) -> Result<()> {
        self.store.embedder().initialize().await?;
        Ok(())
    }

    /// Remember a conversation turn. Failures are logged and dropped.
    pub async fn add_message(&self, text: &str, role: Role, message_id: &str) {
        self.store.insert(text, role, message_id).await;
    }

    /// Assemble the context relevant to `query`.
    ///
    /// Never fails: a search error yields an empty context.
    pub async fn get_relevant_context(&self, query: &str) -> RetrievedContext {
        let search = &self.config.search;
        let hits = match self.store.search(query, search.top_k, search.min_score).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Context search failed, continuing without context: {e}");
                return RetrievedContext::default();
            }
        };

        let budget = self.config.budget.effective_tokens();
        let packed = pack(&hits, budget, self.estimator.as_ref());
        debug!(
            "Packed {} of {} matches into {} of {budget} tokens",
            packed.selected.len(),
            hits.len(),
            packed.total_tokens
        );

        let mut context = RetrievedContext {
            relevant_messages: packed.selected.iter().map(RelevantMessage::from).collect(),
            summary: None,
            total_tokens: packed.total_tokens,
        };

        if context.relevant_messages.is_empty() && !hits.is_empty() {
            let summary = summarize(
                &hits,
                self.config.summary.max_results,
                self.config.summary.max_chars,
            );
            context.total_tokens = self.estimator.estimate(&summary);
            debug!("No match fits the budget, summarizing the top matches instead");
            context.summary = Some(summary);
        }

        context
    }

    /// Replace the memory with the given conversation.
    ///
    /// Fails only if the embedding model cannot be acquired. Messages that
    /// fail to embed are skipped. Returns the number of messages stored.
    pub async fn rehydrate_from_messages(&self, messages: &[ConversationMessage]) -> Result<usize> {
        self.initialize().await?;
        self.store.clear().await;

        let mut stored = 0;
        for message in messages {
            if self
                .store
                .insert(&message.text, message.role, &message.id)
                .await
                .is_some()
            {
                stored += 1;
            }
        }

        if stored < messages.len() {
            warn!("Skipped {} messages during rehydration", messages.len() - stored);
        }
        info!("Rehydrated memory with {stored} of {} messages", messages.len());
        Ok(stored)
    }

    /// Forget every stored turn.
    pub async fn clear_memory(&self) {
        self.store.clear().await;
    }

    /// Number of stored turns.
    pub async fn memory_size(&self) -> usize {
        self.store.document_count().await
    }

    /// Get retriever statistics.
    pub async fn stats(&self) -> RetrieverStats {
        let embedder = self.store.embedder();
        let cached_embeddings = match embedder.cache() {
            Some(cache) => cache.stats().await.entries,
            None => 0,
        };

        RetrieverStats {
            documents: self.store.document_count().await,
            max_documents: self.store.max_documents(),
            embedder_initialized: embedder.is_initialized(),
            cached_embeddings,
        }
    }
}

/// Builder for [`ContextRetriever`].
pub struct ContextRetrieverBuilder {
    config: RetrievalConfig,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    estimator: Option<Box<dyn TokenEstimator>>,
}

impl ContextRetrieverBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: RetrievalConfig::default(),
            provider: None,
            estimator: None,
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: RetrievalConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this provider instead of the one named by the configuration.
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the vector store capacity.
    pub fn with_max_documents(mut self, max_documents: usize) -> Self {
        self.config.max_documents = max_documents;
        self
    }

    /// Bound every embedding call.
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.config.embedding.timeout_ms =
            Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Replace the character-ratio token estimator.
    pub fn with_token_estimator(mut self, estimator: impl TokenEstimator + 'static) -> Self {
        self.estimator = Some(Box::new(estimator));
        self
    }

    /// Build the retriever. No model is loaded until first use.
    pub fn build(self) -> Result<ContextRetriever> {
        self.config.validate()?;

        let embedding = &self.config.embedding;
        let provider = match self.provider {
            Some(provider) => provider,
            None => create_provider(embedding)?,
        };

        let mut embedder = Embedder::new(provider);
        if let Some(timeout_ms) = embedding.timeout_ms {
            embedder = embedder.with_timeout(Duration::from_millis(timeout_ms));
        }
        if embedding.cache_enabled && embedding.cache_max_entries > 0 {
            embedder = embedder.with_cache(EmbeddingCache::new(embedding.cache_max_entries));
        }

        let estimator = self.estimator.unwrap_or_else(|| {
            Box::new(CharRatioEstimator::new(self.config.budget.tokens_per_char))
        });

        info!(
            "Context retriever ready (provider {}, capacity {})",
            embedder.provider().name(),
            self.config.max_documents
        );

        Ok(ContextRetriever {
            store: VectorStore::new(embedder, self.config.max_documents),
            config: self.config,
            estimator,
        })
    }
}

impl Default for ContextRetrieverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the embedding provider named by the configuration.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider {
        EmbeddingProviderType::OpenAI => {
            let mut provider = OpenAIProvider::new();
            if let Some(key) = &config.api_key {
                provider = provider.with_api_key(key);
            }
            if let Some(url) = &config.base_url {
                provider = provider.with_base_url(url);
            }
            if let Some(model) = &config.model {
                provider = provider.with_model(model);
            }
            Ok(Arc::new(provider))
        }
        EmbeddingProviderType::Hashing => {
            let mut provider = HashingProvider::new();
            if let Some(dimension) = config.dimension {
                provider = provider.with_dimension(dimension);
            }
            Ok(Arc::new(provider))
        }
        #[cfg(feature = "local-embeddings")]
        EmbeddingProviderType::Local => {
            let mut provider = recall_embeddings::LocalProvider::new();
            if let Some(model) = &config.model {
                provider = provider.with_model(model)?;
            }
            Ok(Arc::new(provider))
        }
        #[cfg(not(feature = "local-embeddings"))]
        EmbeddingProviderType::Local => Err(RetrievalError::Config(
            "the local embedding provider requires the local-embeddings feature".to_string(),
        )),
        EmbeddingProviderType::None => Err(RetrievalError::Config(
            "semantic memory needs an embedding provider, but none is configured".to_string(),
        )),
    }
}

/// Statistics about the context retriever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieverStats {
    /// Number of stored turns.
    pub documents: usize,

    /// Store capacity.
    pub max_documents: usize,

    /// Whether the embedding model has been acquired.
    pub embedder_initialized: bool,

    /// Number of cached embeddings.
    pub cached_embeddings: usize,
}
