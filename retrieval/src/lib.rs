//! # Context Retrieval
//!
//! This crate gives a chat client a bounded semantic memory of the
//! conversation:
//!
//! - **Vector Store**: Embedded turns with oldest-first eviction
//! - **Similarity Search**: Cosine ranking with a score floor
//! - **Token Budgeting**: Greedy packing with a summary fallback
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Context Retriever                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  add_message ──► Embedder ──► VectorStore (append + evict)      │
//! │                                                                 │
//! │  get_relevant_context                                           │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  Embedder ──► VectorStore::search ──► pack ──► RetrievedContext │
//! │                                        │                        │
//! │                                        └──► summarize           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use recall_retrieval::{ContextRetriever, RetrievalConfig, Role};
//!
//! let retriever = ContextRetriever::new(RetrievalConfig::load("recall.toml")?)?;
//! retriever.initialize().await?;
//!
//! retriever.add_message("Paris is the capital of France", Role::Assistant, "m1").await;
//!
//! let context = retriever.get_relevant_context("What is France's capital?").await;
//! let prompt = context.augment_prompt("What is France's capital?");
//! ```
//!
//! ## Features
//!
//! - `local-embeddings` (default): runs all-MiniLM-L6-v2 in-process through
//!   fastembed and makes it the default provider. The first
//!   [`ContextRetriever::initialize`] downloads the model. Build with
//!   `--no-default-features` to drop the ONNX runtime; the default provider
//!   then becomes the OpenAI-compatible API.

pub mod budget;
pub mod config;
pub mod context;
pub mod document;
pub mod engine;
pub mod error;
pub mod store;

pub use budget::{CharRatioEstimator, ContextBudget, TokenEstimator};
pub use config::{
    AVG_TOKENS_PER_CHAR, DEFAULT_MIN_SCORE, DEFAULT_TOP_K, EmbeddingConfig,
    EmbeddingProviderType, MAX_CONTEXT_TOKENS, MAX_DOCUMENTS, RetrievalConfig, SearchConfig,
    SummaryConfig,
};
pub use context::{RelevantMessage, RetrievedContext};
pub use document::{ConversationMessage, Document, Role, SearchHit};
pub use engine::{ContextRetriever, ContextRetrieverBuilder, RetrieverStats};
pub use error::{Result, RetrievalError};
pub use store::VectorStore;

// Re-export from dependencies for convenience
pub use recall_embeddings::{Embedder, EmbeddingError, EmbeddingProvider, HashingProvider};
