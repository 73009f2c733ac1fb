//! Lazily initialized, normalizing front end over an [`EmbeddingProvider`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::Embedding;
use crate::cache::EmbeddingCache;
use crate::error::{EmbeddingError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingRequest};
use crate::similarity::normalize;

/// Turns text into unit-length vectors.
///
/// The provider's model is acquired once, on the first call to
/// [`Embedder::initialize`] or [`Embedder::embed`]. Concurrent first calls
/// share a single load. A failed load leaves the embedder uninitialized so
/// a later call can retry.
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    ready: OnceCell<()>,
    timeout: Option<Duration>,
    cache: Option<EmbeddingCache>,
}

impl Embedder {
    /// Wrap a provider. No model is loaded until first use.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            ready: OnceCell::new(),
            timeout: None,
            cache: None,
        }
    }

    /// Bound every call to [`Embedder::embed`], including a model load it
    /// triggers. Expired calls are cancelled and fail with
    /// [`EmbeddingError::Timeout`]. An explicit [`Embedder::initialize`] is
    /// not bounded.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Reuse vectors for texts that were embedded before.
    pub fn with_cache(mut self, cache: EmbeddingCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    /// The embedding cache, if enabled.
    pub fn cache(&self) -> Option<&EmbeddingCache> {
        self.cache.as_ref()
    }

    /// Acquire the provider's model. A no-op once it has succeeded.
    pub async fn initialize(&self) -> Result<()> {
        self.ready
            .get_or_try_init(|| async {
                let name = self.provider.name();
                info!("Initializing embedding provider {name}");
                self.provider.load().await.map_err(|e| {
                    if e.is_init_failure() {
                        e
                    } else {
                        EmbeddingError::init(name, e)
                    }
                })?;
                info!(
                    "Embedding provider {name} ready (model {}, {} dimensions)",
                    self.provider.default_model(),
                    self.provider.default_dimension()
                );
                Ok::<(), EmbeddingError>(())
            })
            .await
            .map(|_| ())
            .inspect_err(|e| warn!("Embedding provider failed to initialize: {e}"))
    }

    /// Whether the model has been acquired.
    pub fn is_initialized(&self) -> bool {
        self.ready.initialized()
    }

    /// Embed `text` as a unit-length vector, initializing on first use.
    pub async fn embed(&self, text: &str) -> Result<Embedding> {
        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.embed_inner(text))
                .await
                .map_err(|_| EmbeddingError::Timeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })?,
            None => self.embed_inner(text).await,
        }
    }

    async fn embed_inner(&self, text: &str) -> Result<Embedding> {
        self.initialize().await?;

        let model = self.provider.default_model();
        if let Some(cache) = &self.cache {
            if let Some(embedding) = cache.get(text, model).await {
                debug!("Cache hit for embedding");
                return Ok(embedding);
            }
        }

        let response = self.provider.embed(EmbeddingRequest::new(text)).await?;

        let mut embedding = response.embedding;
        if embedding.is_empty() {
            return Err(EmbeddingError::EmptyEmbedding);
        }
        normalize(&mut embedding);

        if let Some(cache) = &self.cache {
            cache.put(text, model, embedding.clone()).await;
        }

        Ok(embedding)
    }
}
