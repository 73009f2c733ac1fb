//! Integration tests for the context retriever.
//!
//! These run the full add / search / budget pipeline against the offline
//! hashing provider, so no model download or network access is needed.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use recall_embeddings::{EmbeddingRequest, EmbeddingResponse};
use recall_retrieval::{
    ContextRetriever, ConversationMessage, Embedder, EmbeddingError, EmbeddingProvider,
    EmbeddingProviderType, HashingProvider, MAX_DOCUMENTS, RetrievalConfig, Role, SearchConfig,
    VectorStore,
};
use tokio_test::assert_ok;

fn hashing_retriever(min_score: f32) -> ContextRetriever {
    let config = RetrievalConfig::default().with_search(SearchConfig {
        min_score,
        ..SearchConfig::default()
    });
    ContextRetriever::builder()
        .with_config(config)
        .with_provider(Arc::new(HashingProvider::new()))
        .build()
        .unwrap()
}

/// Fails every other embedding call and counts model loads.
#[derive(Default)]
struct FlakyProvider {
    calls: AtomicUsize,
    loads: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for FlakyProvider {
    fn name(&self) -> &str {
        "flaky"
    }

    fn default_model(&self) -> &str {
        "flaky"
    }

    fn default_dimension(&self) -> usize {
        HashingProvider::new().default_dimension()
    }

    async fn load(&self) -> recall_embeddings::Result<()> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(())
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> recall_embeddings::Result<EmbeddingResponse> {
        if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
            return Err(EmbeddingError::ApiRequest("connection reset".into()));
        }
        HashingProvider::new().embed(request).await
    }
}

#[tokio::test]
async fn test_paris_scenario() {
    let retriever = hashing_retriever(0.35);
    retriever
        .add_message("Paris is the capital of France", Role::Assistant, "m1")
        .await;

    let context = retriever.get_relevant_context("What is France's capital?").await;
    assert_eq!(context.relevant_messages.len(), 1);
    let message = &context.relevant_messages[0];
    assert_eq!(message.text, "Paris is the capital of France");
    assert_eq!(message.role, Role::Assistant);
    assert_eq!(message.message_id, "m1");
    assert!(message.score >= 0.35, "score {}", message.score);
    assert!(context.summary.is_none());

    let strict = hashing_retriever(0.99);
    strict
        .add_message("Paris is the capital of France", Role::Assistant, "m1")
        .await;
    let context = strict.get_relevant_context("What is France's capital?").await;
    assert!(context.is_empty());
    assert_eq!(context.total_tokens, 0);
}

#[tokio::test]
async fn test_irrelevant_turns_are_filtered() {
    let retriever = hashing_retriever(0.35);
    retriever
        .add_message("The borrow checker enforces ownership rules in Rust", Role::Assistant, "a")
        .await;
    retriever
        .add_message("My favourite pizza topping is mushrooms", Role::User, "b")
        .await;

    let context = retriever
        .get_relevant_context("How does the Rust borrow checker work?")
        .await;
    let ids: Vec<&str> = context
        .relevant_messages
        .iter()
        .map(|m| m.message_id.as_str())
        .collect();
    assert_eq!(ids, vec!["a"]);

    let prompt = context.augment_prompt("How does the Rust borrow checker work?");
    assert_eq!(
        prompt,
        "Previous conversation context:\n\
         [Previous context] The borrow checker enforces ownership rules in Rust\n\
         \n\
         Current question: How does the Rust borrow checker work?"
    );
}

#[tokio::test]
async fn test_capacity_keeps_newest_documents() {
    let store = VectorStore::new(Embedder::new(Arc::new(HashingProvider::new())), MAX_DOCUMENTS);
    let extra = 5;
    for i in 0..MAX_DOCUMENTS + extra {
        store
            .insert(&format!("turn {i}"), Role::User, &format!("m{i}"))
            .await;
    }

    let documents = store.documents().await;
    assert_eq!(documents.len(), MAX_DOCUMENTS);
    assert_eq!(documents[0].source_message_id, format!("m{extra}"));
    assert_eq!(
        documents[MAX_DOCUMENTS - 1].source_message_id,
        format!("m{}", MAX_DOCUMENTS + extra - 1)
    );
}

#[tokio::test]
async fn test_rehydrate_skips_failures() {
    let provider = Arc::new(FlakyProvider::default());
    let retriever = ContextRetriever::builder()
        .with_provider(provider.clone())
        .build()
        .unwrap();

    let messages: Vec<ConversationMessage> = (0..6)
        .map(|i| {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            ConversationMessage::new(format!("m{i}"), format!("message body {i}"), role)
        })
        .collect();

    let stored = retriever.rehydrate_from_messages(&messages).await.unwrap();
    assert_eq!(stored, 3);
    assert_eq!(retriever.memory_size().await, 3);
    assert!(retriever.memory_size().await <= messages.len());
    assert_eq!(provider.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_initialize_loads_once() {
    let provider = Arc::new(FlakyProvider::default());
    let retriever = ContextRetriever::builder()
        .with_provider(provider.clone())
        .build()
        .unwrap();

    let (a, b, c) = tokio::join!(
        retriever.initialize(),
        retriever.initialize(),
        retriever.initialize()
    );
    assert_ok!(a);
    assert_ok!(b);
    assert_ok!(c);
    assert_eq!(provider.loads.load(Ordering::SeqCst), 1);
    assert!(retriever.stats().await.embedder_initialized);
}

#[tokio::test]
async fn test_conversation_switch() {
    let retriever = hashing_retriever(0.1);
    let first = vec![
        ConversationMessage::new("1", "I love the city of Paris", Role::User),
        ConversationMessage::new("2", "Paris is beautiful in spring", Role::Assistant),
    ];
    let second = vec![ConversationMessage::new(
        "3",
        "Sourdough needs a mature starter",
        Role::Assistant,
    )];

    retriever.rehydrate_from_messages(&first).await.unwrap();
    assert_eq!(retriever.memory_size().await, 2);

    retriever.rehydrate_from_messages(&second).await.unwrap();
    assert_eq!(retriever.memory_size().await, 1);
    assert!(
        retriever
            .get_relevant_context("What do you know about Paris?")
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn test_config_file_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recall.toml");
    std::fs::write(
        &path,
        r#"
max_documents = 2

[search]
top_k = 1
min_score = 0.2

[embedding]
provider = "hashing"
cache_enabled = false
"#,
    )
    .unwrap();

    let config = RetrievalConfig::load(&path).unwrap();
    assert_eq!(config.embedding.provider, EmbeddingProviderType::Hashing);

    let retriever = ContextRetriever::new(config).unwrap();
    retriever.add_message("apples are red", Role::User, "m1").await;
    retriever.add_message("bananas are yellow", Role::User, "m2").await;
    retriever.add_message("cherries are red", Role::User, "m3").await;

    let stats = retriever.stats().await;
    assert_eq!(stats.documents, 2);
    assert_eq!(stats.max_documents, 2);
    assert_eq!(stats.cached_embeddings, 0);

    let context = retriever.get_relevant_context("which fruit is red").await;
    let ids: Vec<&str> = context
        .relevant_messages
        .iter()
        .map(|m| m.message_id.as_str())
        .collect();
    assert_eq!(ids, vec!["m3"]);
}
