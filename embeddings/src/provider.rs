//! Embedding providers.
//!
//! Supports a remote OpenAI-compatible API, a deterministic hashing
//! embedder, and (behind the `local-embeddings` feature) in-process
//! inference through fastembed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Request for generating embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Text to embed.
    pub text: String,
}

impl EmbeddingRequest {
    /// Create a new embedding request.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Response from embedding generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// The generated embedding.
    pub embedding: Embedding,

    /// Model used to generate the embedding.
    pub model: String,

    /// Dimension of the embedding.
    pub dimension: usize,

    /// Token usage (if available).
    pub tokens_used: Option<u64>,
}

impl EmbeddingResponse {
    fn from_vector(embedding: Embedding, model: impl Into<String>) -> Self {
        let dimension = embedding.len();
        Self {
            embedding,
            model: model.into(),
            dimension,
            tokens_used: None,
        }
    }
}

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Get the default model for this provider.
    fn default_model(&self) -> &str;

    /// Get the default embedding dimension.
    fn default_dimension(&self) -> usize;

    /// Acquire the model. Called once before the first embedding.
    ///
    /// Providers with nothing to acquire keep the default.
    async fn load(&self) -> Result<()> {
        Ok(())
    }

    /// Generate an embedding for the given text.
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse>;
}

/// OpenAI embedding provider.
///
/// Works against any server exposing the OpenAI `/embeddings` route.
pub struct OpenAIProvider {
    /// API key.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Default model.
    default_model: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider.
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
            default_model: "text-embedding-3-small".to_string(),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }
}

impl Default for OpenAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn default_dimension(&self) -> usize {
        match self.default_model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        }
    }

    async fn load(&self) -> Result<()> {
        if self.api_key.is_none() {
            return Err(EmbeddingError::ProviderNotConfigured);
        }
        Ok(())
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(EmbeddingError::ProviderNotConfigured)?;

        debug!("Generating embedding with model: {}", self.default_model);

        let body = serde_json::json!({
            "input": request.text,
            "model": self.default_model
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(EmbeddingError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest(format!(
                "API error {status}: {error_text}"
            )));
        }

        let result: OpenAIEmbeddingResponse = response.json().await?;

        let embedding = result
            .data
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("No embedding in response".to_string()))?
            .embedding;

        let mut response = EmbeddingResponse::from_vector(embedding, result.model);
        response.tokens_used = result.usage.map(|u| u.total_tokens);

        debug!("Generated embedding with {} dimensions", response.dimension);

        Ok(response)
    }
}

/// OpenAI API response format.
#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
    model: String,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    total_tokens: u64,
}

/// Default width of [`HashingProvider`] vectors.
pub const HASHING_DIMENSION: usize = 256;

/// Offline provider that hashes word tokens into a fixed-width count vector.
///
/// Similarity is lexical (shared words), not semantic. Output is stable
/// across runs and platforms, which makes it usable without a model
/// download and in tests.
pub struct HashingProvider {
    dimension: usize,
}

impl HashingProvider {
    /// Create a hashing provider with [`HASHING_DIMENSION`] buckets.
    pub fn new() -> Self {
        Self {
            dimension: HASHING_DIMENSION,
        }
    }

    /// Use a different number of buckets. Zero is bumped to one.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension.max(1);
        self
    }

    fn vectorize(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = fnv1a(token.to_lowercase().as_bytes()) % self.dimension as u64;
            vector[bucket as usize] += 1.0;
        }
        vector
    }
}

impl Default for HashingProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    fn name(&self) -> &str {
        "hashing"
    }

    fn default_model(&self) -> &str {
        "fnv1a-bag-of-words"
    }

    fn default_dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let embedding = self.vectorize(&request.text);
        Ok(EmbeddingResponse::from_vector(embedding, self.default_model()))
    }
}

/// Local embedding provider backed by fastembed (ONNX runtime).
///
/// The model is downloaded and loaded by [`EmbeddingProvider::load`];
/// inference runs on the blocking thread pool.
#[cfg(feature = "local-embeddings")]
pub struct LocalProvider {
    model_name: String,
    dimension: usize,
    engine: tokio::sync::OnceCell<std::sync::Arc<std::sync::Mutex<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings")]
impl LocalProvider {
    /// Create a provider for `all-minilm-l6-v2`.
    pub fn new() -> Self {
        Self {
            model_name: "all-minilm-l6-v2".to_string(),
            dimension: 384,
            engine: tokio::sync::OnceCell::new(),
        }
    }

    /// Select a different supported model.
    pub fn with_model(mut self, model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        let (_, dimension) = resolve_local_model(&model)?;
        self.model_name = model;
        self.dimension = dimension;
        Ok(self)
    }

    async fn engine(&self) -> Result<std::sync::Arc<std::sync::Mutex<fastembed::TextEmbedding>>> {
        let engine = self
            .engine
            .get_or_try_init(|| async {
                let (model, _) = resolve_local_model(&self.model_name)?;
                tracing::info!("Loading local embedding model {}", self.model_name);
                let loaded = tokio::task::spawn_blocking(move || {
                    fastembed::TextEmbedding::try_new(
                        fastembed::InitOptions::new(model).with_show_download_progress(false),
                    )
                })
                .await
                .map_err(|e| EmbeddingError::init("local", e))?
                .map_err(|e| EmbeddingError::init("local", e))?;
                Ok::<_, EmbeddingError>(std::sync::Arc::new(std::sync::Mutex::new(loaded)))
            })
            .await?;
        Ok(engine.clone())
    }
}

#[cfg(feature = "local-embeddings")]
impl Default for LocalProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "local-embeddings")]
fn resolve_local_model(name: &str) -> Result<(fastembed::EmbeddingModel, usize)> {
    match name {
        "all-minilm-l6-v2" => Ok((fastembed::EmbeddingModel::AllMiniLML6V2, 384)),
        "bge-small-en-v1.5" => Ok((fastembed::EmbeddingModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" => Ok((fastembed::EmbeddingModel::BGEBaseENV15, 768)),
        other => Err(EmbeddingError::init(
            "local",
            format!(
                "unknown local model '{other}', expected all-minilm-l6-v2, bge-small-en-v1.5 or bge-base-en-v1.5"
            ),
        )),
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn default_model(&self) -> &str {
        &self.model_name
    }

    fn default_dimension(&self) -> usize {
        self.dimension
    }

    async fn load(&self) -> Result<()> {
        self.engine().await.map(|_| ())
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let engine = self.engine().await?;
        let text = request.text;
        let embeddings = tokio::task::spawn_blocking(move || {
            let mut model = engine
                .lock()
                .map_err(|_| EmbeddingError::InvalidResponse("local model lock poisoned".into()))?;
            model
                .embed(vec![text], None)
                .map_err(|e| EmbeddingError::ApiRequest(format!("local inference failed: {e}")))
        })
        .await
        .map_err(|e| EmbeddingError::ApiRequest(format!("local inference task failed: {e}")))??;

        let embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("No embedding in response".to_string()))?;

        Ok(EmbeddingResponse::from_vector(embedding, self.model_name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_openai_provider_default_dimensions() {
        let provider = OpenAIProvider::new().with_model("text-embedding-3-large");
        assert_eq!(provider.default_dimension(), 3072);
    }

    #[tokio::test]
    async fn test_openai_load_requires_api_key() {
        let mut provider = OpenAIProvider::new();
        provider.api_key = None;
        assert!(matches!(
            provider.load().await,
            Err(EmbeddingError::ProviderNotConfigured)
        ));

        let provider = provider.with_api_key("sk-test");
        assert!(provider.load().await.is_ok());
    }

    #[tokio::test]
    async fn test_openai_embed_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "embedding": [0.5, -0.25, 1.0], "index": 0 }],
                "model": "text-embedding-3-small",
                "usage": { "prompt_tokens": 4, "total_tokens": 4 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new()
            .with_api_key("sk-test")
            .with_base_url(format!("{}/v1/", server.uri()));

        let response = provider
            .embed(EmbeddingRequest::new("hello"))
            .await
            .unwrap();
        assert_eq!(response.embedding, vec![0.5, -0.25, 1.0]);
        assert_eq!(response.dimension, 3);
        assert_eq!(response.tokens_used, Some(4));
    }

    #[tokio::test]
    async fn test_openai_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new()
            .with_api_key("sk-test")
            .with_base_url(server.uri());

        let err = provider
            .embed(EmbeddingRequest::new("hello"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::RateLimited {
                retry_after_secs: 7
            }
        ));
    }

    #[tokio::test]
    async fn test_openai_empty_data_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [],
                "model": "text-embedding-3-small"
            })))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new()
            .with_api_key("sk-test")
            .with_base_url(server.uri());

        let err = provider
            .embed(EmbeddingRequest::new("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_hashing_provider_is_deterministic() {
        let provider = HashingProvider::new();
        let a = provider.embed(EmbeddingRequest::new("Paris is lovely")).await.unwrap();
        let b = provider.embed(EmbeddingRequest::new("paris IS lovely!")).await.unwrap();

        assert_eq!(a.dimension, HASHING_DIMENSION);
        assert_eq!(a.embedding, b.embedding);
        assert_eq!(a.embedding.iter().sum::<f32>(), 3.0);
    }

    #[tokio::test]
    async fn test_hashing_provider_empty_text_is_zero_vector() {
        let provider = HashingProvider::new().with_dimension(8);
        let response = provider.embed(EmbeddingRequest::new("  ...  ")).await.unwrap();
        assert_eq!(response.embedding, vec![0.0; 8]);
    }

    #[test]
    fn test_fnv1a_reference_values() {
        // Published FNV-1a 64-bit test vectors.
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
    }
}

#[cfg(all(test, feature = "local-embeddings"))]
mod local_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolve_known_local_models() {
        for (name, dimension) in [
            ("all-minilm-l6-v2", 384),
            ("bge-small-en-v1.5", 384),
            ("bge-base-en-v1.5", 768),
        ] {
            let (_, resolved) = resolve_local_model(name).unwrap();
            assert_eq!(resolved, dimension, "{name}");
        }
    }

    #[test]
    fn test_resolve_unknown_local_model() {
        let err = resolve_local_model("gpt-embed-9000").unwrap_err();
        assert!(err.is_init_failure(), "{err}");
        assert!(err.to_string().contains("gpt-embed-9000"), "{err}");
    }

    #[test]
    fn test_local_provider_with_model() {
        let provider = LocalProvider::new();
        assert_eq!(provider.default_model(), "all-minilm-l6-v2");
        assert_eq!(provider.default_dimension(), 384);

        let provider = LocalProvider::new().with_model("bge-base-en-v1.5").unwrap();
        assert_eq!(provider.default_model(), "bge-base-en-v1.5");
        assert_eq!(provider.default_dimension(), 768);

        assert!(LocalProvider::new().with_model("unknown").is_err());
    }

    #[tokio::test]
    #[ignore = "downloads the all-minilm-l6-v2 model"]
    async fn test_local_provider_embeds_384_dimensions() {
        let provider = LocalProvider::new();
        provider.load().await.unwrap();

        let response = provider
            .embed(EmbeddingRequest::new("Paris is the capital of France"))
            .await
            .unwrap();
        assert_eq!(response.embedding.len(), 384);
        assert_eq!(response.model, "all-minilm-l6-v2");
    }
}
