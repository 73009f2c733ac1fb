//! # Embeddings
//!
//! This crate turns conversation text into dense vectors and compares them.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert text to unit-length vectors
//! - **Lazy Initialization**: The model is acquired once, on first use
//! - **Multiple Providers**: OpenAI-compatible APIs, offline hashing, local ONNX models
//! - **Caching**: Re-embedding a known text skips the provider
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedder ──► Embedding                   │
//! │       │                   │             │                       │
//! │       ▼                   ▼             ▼                       │
//! │  OpenAI/Hashing/Local  EmbeddingCache  cosine_similarity        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod embedder;
pub mod error;
pub mod provider;
pub mod similarity;

pub use cache::{CacheStats, EmbeddingCache};
pub use embedder::Embedder;
pub use error::{EmbeddingError, Result};
#[cfg(feature = "local-embeddings")]
pub use provider::LocalProvider;
pub use provider::{
    EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, HASHING_DIMENSION, HashingProvider,
    OpenAIProvider,
};
pub use similarity::{SimilarityResult, cosine_similarity, find_top_k, normalize};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
