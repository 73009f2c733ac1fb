//! Embedding cache for repeated texts.
//!
//! Conversation switches re-embed every message of the target
//! conversation; the cache makes switching back to a conversation cheap.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::Embedding;

/// Cache entry for an embedding.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// The embedding vector.
    embedding: Embedding,

    /// Text the embedding was generated from.
    text: String,

    /// Model used to generate the embedding.
    model: String,

    /// Insertion order, used for eviction.
    inserted: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<u64, CacheEntry>,
    next_insert: u64,
}

/// Bounded in-memory cache of embeddings keyed by (text, model).
///
/// When full, the oldest inserted entry is evicted.
pub struct EmbeddingCache {
    state: RwLock<CacheState>,

    /// Maximum cache size. Zero disables caching.
    max_entries: usize,
}

impl EmbeddingCache {
    /// Create a new in-memory cache.
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            max_entries,
        }
    }

    /// Compute a hash for cache lookup.
    fn hash_key(text: &str, model: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        model.hash(&mut hasher);
        hasher.finish()
    }

    /// Get an embedding from the cache.
    pub async fn get(&self, text: &str, model: &str) -> Option<Embedding> {
        let key = Self::hash_key(text, model);
        let state = self.state.read().await;
        state
            .entries
            .get(&key)
            .filter(|e| e.text == text && e.model == model)
            .map(|e| e.embedding.clone())
    }

    /// Put an embedding in the cache.
    pub async fn put(&self, text: &str, model: &str, embedding: Embedding) {
        if self.max_entries == 0 {
            return;
        }

        let key = Self::hash_key(text, model);
        let mut state = self.state.write().await;

        // Evict if at capacity
        if !state.entries.contains_key(&key) && state.entries.len() >= self.max_entries {
            if let Some(oldest_key) = state
                .entries
                .iter()
                .min_by_key(|(_, v)| v.inserted)
                .map(|(k, _)| *k)
            {
                state.entries.remove(&oldest_key);
            }
        }

        let inserted = state.next_insert;
        state.next_insert += 1;
        state.entries.insert(
            key,
            CacheEntry {
                embedding,
                text: text.to_string(),
                model: model.to_string(),
                inserted,
            },
        );
        debug!("Cached embedding for text (model: {model})");
    }

    /// Clear the entire cache.
    pub async fn clear(&self) {
        self.state.write().await.entries.clear();
        info!("Cleared embedding cache");
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        let mut models: Vec<String> = state.entries.values().map(|e| e.model.clone()).collect();
        models.sort();
        models.dedup();
        CacheStats {
            entries: state.entries.len(),
            max_entries: self.max_entries,
            models,
        }
    }
}

/// Statistics about the embedding cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries in cache.
    pub entries: usize,

    /// Maximum cache size.
    pub max_entries: usize,

    /// Models with cached embeddings.
    pub models: Vec<String>,
}
