//! Bounded vector store over conversation turns.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use recall_embeddings::{Embedder, EmbeddingError, find_top_k};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::document::{Document, Role, SearchHit};
use crate::error::Result;

#[derive(Debug, Default)]
struct StoreState {
    /// Documents in (timestamp, sequence) order, oldest first.
    documents: Vec<Arc<Document>>,
    next_sequence: u64,
    last_timestamp: Option<DateTime<Utc>>,
    dimension: Option<usize>,
}

/// Capacity-bounded nearest-neighbour index over embedded turns.
///
/// Inserting past capacity evicts the oldest documents. Search is a brute
/// force cosine scan, which is fine for a few thousand vectors; larger
/// capacities would want an approximate index.
///
/// Embedding runs before the store lock is taken. The append and the
/// eviction that follows it run under a single write lock, so concurrent
/// inserts never lose each other's documents. A search that overlaps an
/// insert may still see the store as it was before that insert.
pub struct VectorStore {
    embedder: Embedder,
    state: RwLock<StoreState>,
    max_documents: usize,
}

impl VectorStore {
    /// Create an empty store holding at most `max_documents` documents.
    pub fn new(embedder: Embedder, max_documents: usize) -> Self {
        Self {
            embedder,
            state: RwLock::new(StoreState::default()),
            max_documents: max_documents.max(1),
        }
    }

    /// The embedder used for documents and queries.
    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    /// Maximum number of documents held.
    pub fn max_documents(&self) -> usize {
        self.max_documents
    }

    /// Embed `text` and store it, evicting the oldest documents if the
    /// store is over capacity. On failure the store is unchanged.
    pub async fn try_insert(
        &self,
        text: &str,
        role: Role,
        source_message_id: &str,
    ) -> Result<Arc<Document>> {
        let vector = self.embedder.embed(text).await?;

        let mut state = self.state.write().await;
        if let Some(expected) = state.dimension {
            if vector.len() != expected {
                return Err(EmbeddingError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                }
                .into());
            }
        }

        let now = Utc::now();
        let timestamp = state.last_timestamp.map_or(now, |last| last.max(now));
        let sequence = state.next_sequence;

        let document = Arc::new(Document {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            vector,
            timestamp,
            sequence,
            role,
            source_message_id: source_message_id.to_string(),
        });

        state.dimension = Some(document.vector.len());
        state.next_sequence += 1;
        state.last_timestamp = Some(timestamp);
        state.documents.push(Arc::clone(&document));

        if state.documents.len() > self.max_documents {
            let excess = state.documents.len() - self.max_documents;
            state.documents.drain(..excess);
            debug!("Evicted {excess} oldest documents");
        }

        debug!(
            "Stored document {} for message {source_message_id} ({} total)",
            document.id,
            state.documents.len()
        );
        Ok(document)
    }

    /// Best-effort insert. Failures are logged and leave the store unchanged.
    pub async fn insert(
        &self,
        text: &str,
        role: Role,
        source_message_id: &str,
    ) -> Option<Arc<Document>> {
        match self.try_insert(text, role, source_message_id).await {
            Ok(document) => Some(document),
            Err(e) => {
                warn!("Failed to store message {source_message_id}: {e}");
                None
            }
        }
    }

    /// Find the documents most similar to `query`.
    ///
    /// Results score at least `min_score`, are sorted by descending score
    /// with ties kept in store order, and number at most `top_k`. An empty
    /// store returns no results without embedding the query.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<SearchHit>> {
        if self.is_empty().await {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query).await?;
        let documents = self.documents().await;

        let mismatched = documents
            .iter()
            .filter(|d| d.vector.len() != query_vector.len())
            .count();
        if mismatched > 0 {
            warn!(
                "{mismatched} stored vectors do not match the query dimension {}, scoring them 0",
                query_vector.len()
            );
        }

        let hits: Vec<SearchHit> = find_top_k(
            &query_vector,
            documents.iter().map(|d| d.vector.as_slice()),
            top_k,
            min_score,
        )
        .into_iter()
        .map(|result| SearchHit {
            document: Arc::clone(&documents[result.index]),
            score: result.score,
        })
        .collect();

        debug!(
            "Search matched {} of {} documents (top_k {top_k}, min_score {min_score})",
            hits.len(),
            documents.len()
        );
        Ok(hits)
    }

    /// Remove every document.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        let removed = state.documents.len();
        state.documents.clear();
        state.dimension = None;
        info!("Cleared vector store ({removed} documents)");
    }

    /// Number of stored documents.
    pub async fn document_count(&self) -> usize {
        self.state.read().await.documents.len()
    }

    /// Whether the store holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.documents.is_empty()
    }

    /// Snapshot of the stored documents, oldest first.
    pub async fn documents(&self) -> Vec<Arc<Document>> {
        self.state.read().await.documents.clone()
    }
}
