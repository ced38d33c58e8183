//! Exercises the RAG response cache end to end through `RagPipeline::query`
//! (no live Postgres needed: a `connect_lazy` pool satisfies
//! `RetrievalService`'s constructor, and an empty match set never reaches
//! it). Mirrors the fake-provider style already used by
//! `src/rag/mod.rs`'s own unit tests, but from outside the crate, so it can
//! assert on the retrieval layer never being touched twice.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pazpaz::circuit_breaker::CircuitBreakerRegistry;
use pazpaz::clients::ClientRepository;
use pazpaz::error::Result;
use pazpaz::ids::{ClientId, SessionId, WorkspaceId};
use pazpaz::kv::memory_store::InMemoryFastStore;
use pazpaz::rag::cache::{cache_key, ResponseCache};
use pazpaz::rag::embedding::{EmbeddingInputType, EmbeddingProvider};
use pazpaz::rag::retrieval::RetrievalService;
use pazpaz::rag::synthesis::{LlmError, LlmProvider};
use pazpaz::rag::{RagPipeline, RagQuery};
use pazpaz::sessions::SessionRepository;
use pazpaz::vector::{ClientNoteField, ClientVectorMatch, ClientVectorStore, SessionVectorMatch, SoapField, VectorStore, EMBEDDING_DIM};

/// Counts every search call so the test can prove a cache hit skips
/// retrieval entirely rather than just returning the same (empty) answer by
/// coincidence.
#[derive(Default)]
struct CountingVectorStore {
    session_searches: AtomicU32,
    client_searches: AtomicU32,
}

#[async_trait]
impl VectorStore for CountingVectorStore {
    async fn insert_session_embedding(&self, _: WorkspaceId, _: SessionId, _: SoapField, _: Vec<f32>) -> Result<()> {
        Ok(())
    }

    async fn insert_session_embeddings_batch(&self, _: WorkspaceId, _: SessionId, _: Vec<(SoapField, Vec<f32>)>) -> Result<()> {
        Ok(())
    }

    async fn search_session_similar(&self, _: WorkspaceId, _: &[f32], _: u32, _: Option<SoapField>, _: f32) -> Result<Vec<SessionVectorMatch>> {
        self.session_searches.fetch_add(1, Ordering::SeqCst);
        Ok(vec![])
    }

    async fn delete_session_embeddings(&self, _: WorkspaceId, _: SessionId) -> Result<u64> {
        Ok(0)
    }

    async fn count_session_embeddings(&self, _: WorkspaceId, _: SessionId) -> Result<i64> {
        Ok(0)
    }
}

#[async_trait]
impl ClientVectorStore for CountingVectorStore {
    async fn insert_client_embedding(&self, _: WorkspaceId, _: ClientId, _: ClientNoteField, _: Vec<f32>) -> Result<()> {
        Ok(())
    }

    async fn search_client_similar(&self, _: WorkspaceId, _: &[f32], _: u32, _: f32) -> Result<Vec<ClientVectorMatch>> {
        self.client_searches.fetch_add(1, Ordering::SeqCst);
        Ok(vec![])
    }

    async fn delete_client_embeddings(&self, _: WorkspaceId, _: ClientId) -> Result<u64> {
        Ok(0)
    }
}

struct FakeEmbeddingProvider;

#[async_trait]
impl EmbeddingProvider for FakeEmbeddingProvider {
    async fn embed(&self, _: &str, _: EmbeddingInputType) -> Result<Vec<f32>> {
        Ok(vec![0.0; EMBEDDING_DIM])
    }
}

struct FakeLlmProvider {
    calls: AtomicU32,
}

#[async_trait]
impl LlmProvider for FakeLlmProvider {
    async fn chat(&self, _: &str, _: &str, _: f32, _: u32) -> std::result::Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("synthesized answer".to_string())
    }
}

#[tokio::test]
async fn cache_hit_skips_retrieval_and_returns_byte_identical_response() {
    let keyring = common::test_keyring();
    let pool = sqlx::PgPool::connect_lazy("postgres://localhost/nonexistent").unwrap();
    let store = Arc::new(CountingVectorStore::default());

    let retrieval = Arc::new(RetrievalService::new(
        pool.clone(),
        store.clone(),
        store.clone(),
        SessionRepository::new(keyring.clone()),
        ClientRepository::new(pool.clone(), keyring),
    ));
    let cache = ResponseCache::new(Arc::new(InMemoryFastStore::new()));
    let audit = Arc::new(pazpaz::audit::AuditSink::new(pool));
    let llm = Arc::new(FakeLlmProvider { calls: AtomicU32::new(0) });

    let pipeline = RagPipeline::new(
        Arc::new(FakeEmbeddingProvider),
        llm.clone(),
        CircuitBreakerRegistry::new(5, 60),
        retrieval,
        cache,
        audit,
    );

    let query = RagQuery {
        workspace_id: WorkspaceId::new(),
        query_text: "lower back pain history".to_string(),
        user_id: None,
        client_id: None,
        max_results: 5,
        min_similarity: 0.7,
    };

    let first = pipeline.query(query.clone()).await;
    assert_eq!(store.session_searches.load(Ordering::SeqCst), 1);
    assert_eq!(store.client_searches.load(Ordering::SeqCst), 1);

    let second = pipeline.query(query.clone()).await;

    // A no-results answer is still cached, so the second call
    // must not touch the vector store again.
    assert_eq!(store.session_searches.load(Ordering::SeqCst), 1);
    assert_eq!(store.client_searches.load(Ordering::SeqCst), 1);

    assert_eq!(first.answer, second.answer);
    assert_eq!(first.citations.len(), second.citations.len());
    assert_eq!(first.language, second.language);
    assert_eq!(first.total_retrieved, second.total_retrieved);

    // Neither call needed synthesis: the no-results branch short-circuits
    // before step 10 ever runs.
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cache_key_is_scoped_by_workspace_and_client() {
    let workspace_a = WorkspaceId::new();
    let workspace_b = WorkspaceId::new();
    let client_id = ClientId::new();

    assert_ne!(cache_key(workspace_a, "pain", None), cache_key(workspace_b, "pain", None));
    assert_ne!(cache_key(workspace_a, "pain", None), cache_key(workspace_a, "pain", Some(client_id)));
}
