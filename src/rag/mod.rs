//! Retrieval & synthesis pipeline orchestration: wires the individual
//! stages in `rag::{language, expansion, embedding, retrieval, formatting,
//! synthesis, citation, filter, cache}` into one end-to-end flow per query.

pub mod cache;
pub mod citation;
pub mod embedding;
pub mod expansion;
pub mod filter;
pub mod formatting;
pub mod language;
pub mod retrieval;
pub mod synthesis;

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::audit::{AuditAction, AuditEvent, AuditSink};
use crate::circuit_breaker::CircuitBreakerRegistry;
use crate::ids::{ClientId, UserId, WorkspaceId};
use crate::rag::cache::{cache_key, query_hash, CachedResponse, ResponseCache};
use crate::rag::citation::{extract_citations, Citation};
use crate::rag::embedding::{EmbeddingInputType, EmbeddingProvider};
use crate::rag::expansion::{compute_adaptive_threshold, expand_query};
use crate::rag::filter::filter_output;
use crate::rag::formatting::format_context;
use crate::rag::language::{detect_language, Language};
use crate::rag::retrieval::RetrievalService;
use crate::rag::synthesis::{synthesize, LlmProvider};

/// Low end of `max_results ∈ [1,10]` range.
const MIN_MAX_RESULTS: u32 = 1;
const MAX_MAX_RESULTS: u32 = 10;
const SYNTHESIS_TEMPERATURE: f32 = 0.3;
const SYNTHESIS_MAX_OUTPUT_TOKENS: u32 = 500;

#[derive(Debug, Clone)]
pub struct RagQuery {
    pub workspace_id: WorkspaceId,
    pub query_text: String,
    pub user_id: Option<UserId>,
    pub client_id: Option<ClientId>,
    pub max_results: u32,
    pub min_similarity: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RagResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub language: String,
    pub total_retrieved: usize,
    pub elapsed_ms: u64,
}

fn no_results_message(language: Language) -> &'static str {
    match language {
        Language::English => "No relevant clinical notes were found for this question.",
        Language::Hebrew => "לא נמצאו רשומות קליניות רלוונטיות לשאלה זו.",
    }
}

fn pipeline_error_message(language: Language) -> &'static str {
    match language {
        Language::English => "The assistant is temporarily unavailable. Please try again shortly.",
        Language::Hebrew => "העוזר אינו זמין כעת. נא לנסות שוב בעוד מספר רגעים.",
    }
}

fn empty_response(language: Language, answer: &'static str, elapsed_ms: u64) -> RagResponse {
    RagResponse {
        answer: answer.to_string(),
        citations: Vec::new(),
        language: language.code().to_string(),
        total_retrieved: 0,
        elapsed_ms,
    }
}

pub struct RagPipeline {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    llm_provider: Arc<dyn LlmProvider>,
    breaker: Arc<CircuitBreakerRegistry>,
    retrieval: Arc<RetrievalService>,
    cache: ResponseCache,
    audit: Arc<AuditSink>,
}

impl RagPipeline {
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        llm_provider: Arc<dyn LlmProvider>,
        breaker: Arc<CircuitBreakerRegistry>,
        retrieval: Arc<RetrievalService>,
        cache: ResponseCache,
        audit: Arc<AuditSink>,
    ) -> Self {
        Self { embedding_provider, llm_provider, breaker, retrieval, cache, audit }
    }

    /// Runs the full pipeline for one query. Steps past the cache probe are
    /// wrapped so that nothing ever escapes as an `Err` to the caller — any
    /// failure becomes a localized answer with no citations.
    pub async fn query(&self, query: RagQuery) -> RagResponse {
        let start = Instant::now();

        // Step 1: parameter validation.
        let max_results = query.max_results.clamp(MIN_MAX_RESULTS, MAX_MAX_RESULTS);
        let hash = query_hash(&query.query_text);

        // Step 3 up front so the cache key and the no-result message both
        // have a language to work with even on a cache hit.
        let language = detect_language(&query.query_text);

        // Step 2: cache probe.
        let key = cache_key(query.workspace_id, &query.query_text, query.client_id);
        if let Some(cached) = self.cache.get(&key).await {
            self.emit_audit(&query, &hash, language, cached.total_retrieved, start.elapsed().as_millis() as u64).await;
            return RagResponse {
                answer: cached.answer,
                citations: cached.citations,
                language: cached.language,
                total_retrieved: cached.total_retrieved,
                elapsed_ms: start.elapsed().as_millis() as u64,
            };
        }

        let outcome = self.run_uncached(&query, language, max_results).await;

        let response = match outcome {
            Ok(response) => {
                let cached = CachedResponse::new(
                    response.answer.clone(),
                    response.citations.clone(),
                    response.language.clone(),
                    response.total_retrieved,
                );
                self.cache.set(&key, &cached).await;
                response
            }
            Err(error) => {
                tracing::warn!(%error, workspace_id = %query.workspace_id, query_hash = %hash, "rag pipeline failed, returning localized error");
                empty_response(language, pipeline_error_message(language), start.elapsed().as_millis() as u64)
            }
        };

        self.emit_audit(&query, &hash, language, response.total_retrieved, start.elapsed().as_millis() as u64).await;

        RagResponse { elapsed_ms: start.elapsed().as_millis() as u64, ..response }
    }

    async fn run_uncached(&self, query: &RagQuery, language: Language, max_results: u32) -> crate::error::Result<RagResponse> {
        // Step 4: adaptive threshold & query expansion.
        let min_similarity = compute_adaptive_threshold(query.min_similarity, &query.query_text);
        let expanded_query = expand_query(&query.query_text, language);

        // Step 5: retrieval (embed once, then search).
        let query_embedding = self
            .embedding_provider
            .embed(&expanded_query, EmbeddingInputType::SearchQuery)
            .await
            .map_err(|error| crate::error::Error::retrieval_failed(error.to_string()))?;

        let session_contexts = self
            .retrieval
            .retrieve_relevant_sessions(query.workspace_id, &query_embedding, max_results, min_similarity, query.client_id)
            .await
            .map_err(|error| crate::error::Error::retrieval_failed(error.to_string()))?;
        let client_contexts = self
            .retrieval
            .retrieve_client_contexts(query.workspace_id, &query_embedding, max_results, min_similarity, query.client_id)
            .await
            .map_err(|error| crate::error::Error::retrieval_failed(error.to_string()))?;

        // Steps 6-7 (hydration, temporal weighting) already happened inside
        // `retrieval`; contexts are ordered by weighted/raw similarity.
        let total_retrieved = session_contexts.len() + client_contexts.len();

        // Step 8: no-results branch.
        if total_retrieved == 0 {
            return Ok(empty_response(language, no_results_message(language), 0));
        }

        // Step 9: context formatting.
        let formatted_context = format_context(&client_contexts, &session_contexts, language);

        // Step 10: synthesis.
        let system_prompt = synthesis_system_prompt(language);
        let user_prompt = synthesis_user_prompt(&query.query_text, &formatted_context, language);
        let raw_answer = synthesize(
            &self.breaker,
            self.llm_provider.as_ref(),
            system_prompt,
            &user_prompt,
            SYNTHESIS_TEMPERATURE,
            SYNTHESIS_MAX_OUTPUT_TOKENS,
        )
        .await?;

        // Step 11: citation extraction.
        let citations = extract_citations(&session_contexts, &client_contexts);

        // Step 12: output filtering (after synthesis, never before).
        let filtered_answer = filter_output(&raw_answer, SYNTHESIS_MAX_OUTPUT_TOKENS as usize);

        Ok(RagResponse {
            answer: filtered_answer,
            citations,
            language: language.code().to_string(),
            total_retrieved,
            elapsed_ms: 0,
        })
    }

    /// Step 14: audit emission. The query text never appears in metadata,
    /// only its hash and length.
    async fn emit_audit(&self, query: &RagQuery, query_hash: &str, language: Language, total_retrieved: usize, processing_time_ms: u64) {
        self.audit
            .emit(AuditEvent {
                actor: query.user_id,
                workspace_id: query.workspace_id,
                action: AuditAction::Read,
                resource_type: "ai_agent",
                resource_id: None,
                metadata: serde_json::json!({
                    "query_hash": query_hash,
                    "query_length": query.query_text.chars().count(),
                    "language": language.code(),
                    "total_retrieved": total_retrieved,
                    "processing_time_ms": processing_time_ms,
                }),
                ip_address: None,
            })
            .await;
    }
}

fn synthesis_system_prompt(language: Language) -> &'static str {
    match language {
        Language::English => {
            "You are a clinical-documentation assistant for a solo therapy practice. \
             Answer only from the provided client profiles and session notes. If the \
             context does not contain an answer, say so plainly. Never invent clinical \
             details."
        }
        Language::Hebrew => {
            "אתה עוזר תיעוד קליני למרפאה טיפולית עצמאית. ענה אך ורק על סמך פרופילי \
             המטופלים ורשומות הטיפול שסופקו. אם אין מענה בתוך ההקשר, ציין זאת במפורש. \
             לעולם אל תמציא פרטים קליניים."
        }
    }
}

fn synthesis_user_prompt(query_text: &str, formatted_context: &str, language: Language) -> String {
    match language {
        Language::English => format!("Question: {query_text}\n\n{formatted_context}"),
        Language::Hebrew => format!("שאלה: {query_text}\n\n{formatted_context}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientRepository;
    use crate::crypto::keystore::InMemorySecretStore;
    use crate::crypto::KeyRing;
    use crate::kv::memory_store::InMemoryFastStore;
    use crate::rag::synthesis::LlmError;
    use crate::sessions::SessionRepository;
    use crate::vector::{ClientNoteField, ClientVectorMatch, ClientVectorStore, SessionVectorMatch, SoapField, VectorStore};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    struct EmptyVectorStore;

    #[async_trait]
    impl VectorStore for EmptyVectorStore {
        async fn insert_session_embedding(
            &self,
            _: WorkspaceId,
            _: crate::ids::SessionId,
            _: SoapField,
            _: Vec<f32>,
        ) -> crate::error::Result<()> {
            Ok(())
        }

        async fn insert_session_embeddings_batch(
            &self,
            _: WorkspaceId,
            _: crate::ids::SessionId,
            _: Vec<(SoapField, Vec<f32>)>,
        ) -> crate::error::Result<()> {
            Ok(())
        }

        async fn search_session_similar(
            &self,
            _: WorkspaceId,
            _: &[f32],
            _: u32,
            _: Option<SoapField>,
            _: f32,
        ) -> crate::error::Result<Vec<SessionVectorMatch>> {
            Ok(vec![])
        }

        async fn delete_session_embeddings(&self, _: WorkspaceId, _: crate::ids::SessionId) -> crate::error::Result<u64> {
            Ok(0)
        }

        async fn count_session_embeddings(&self, _: WorkspaceId, _: crate::ids::SessionId) -> crate::error::Result<i64> {
            Ok(0)
        }
    }

    #[async_trait]
    impl ClientVectorStore for EmptyVectorStore {
        async fn insert_client_embedding(
            &self,
            _: WorkspaceId,
            _: ClientId,
            _: ClientNoteField,
            _: Vec<f32>,
        ) -> crate::error::Result<()> {
            Ok(())
        }

        async fn search_client_similar(&self, _: WorkspaceId, _: &[f32], _: u32, _: f32) -> crate::error::Result<Vec<ClientVectorMatch>> {
            Ok(vec![])
        }

        async fn delete_client_embeddings(&self, _: WorkspaceId, _: ClientId) -> crate::error::Result<u64> {
            Ok(0)
        }
    }

    struct FakeEmbeddingProvider;

    #[async_trait]
    impl EmbeddingProvider for FakeEmbeddingProvider {
        async fn embed(&self, _: &str, _: EmbeddingInputType) -> crate::error::Result<Vec<f32>> {
            Ok(vec![0.0; crate::vector::EMBEDDING_DIM])
        }
    }

    struct FakeLlmProvider {
        calls: StdMutex<u32>,
    }

    #[async_trait]
    impl LlmProvider for FakeLlmProvider {
        async fn chat(&self, _: &str, _: &str, _: f32, _: u32) -> Result<String, LlmError> {
            *self.calls.lock().unwrap() += 1;
            Ok("synthesized clinical answer".to_string())
        }
    }

    fn keyring() -> KeyRing {
        let mut keys = HashMap::new();
        keys.insert("v1".to_string(), [3u8; 32]);
        KeyRing::new(Arc::new(InMemorySecretStore::new(keys)), "v1")
    }

    fn pipeline_with_no_results() -> RagPipeline {
        let breaker = CircuitBreakerRegistry::new(5, 60);
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/nonexistent").unwrap();
        let retrieval = Arc::new(RetrievalService::new(
            pool.clone(),
            Arc::new(EmptyVectorStore),
            Arc::new(EmptyVectorStore),
            SessionRepository::new(keyring()),
            ClientRepository::new(pool, keyring()),
        ));
        let cache = ResponseCache::new(Arc::new(InMemoryFastStore::new()));
        let audit = Arc::new(AuditSink::new(sqlx::PgPool::connect_lazy("postgres://localhost/nonexistent").unwrap()));

        RagPipeline::new(
            Arc::new(FakeEmbeddingProvider),
            Arc::new(FakeLlmProvider { calls: StdMutex::new(0) }),
            breaker,
            retrieval,
            cache,
            audit,
        )
    }

    #[tokio::test]
    async fn no_results_returns_localized_message_with_no_citations() {
        let pipeline = pipeline_with_no_results();
        let response = pipeline
            .query(RagQuery {
                workspace_id: WorkspaceId::new(),
                query_text: "lower back pain history".to_string(),
                user_id: None,
                client_id: None,
                max_results: 5,
                min_similarity: 0.7,
            })
            .await;

        assert_eq!(response.total_retrieved, 0);
        assert!(response.citations.is_empty());
        assert_eq!(response.answer, no_results_message(Language::English));
    }

    #[tokio::test]
    async fn max_results_outside_range_is_clamped_not_rejected() {
        let pipeline = pipeline_with_no_results();
        let response = pipeline
            .query(RagQuery {
                workspace_id: WorkspaceId::new(),
                query_text: "pain".to_string(),
                user_id: None,
                client_id: None,
                max_results: 999,
                min_similarity: 0.7,
            })
            .await;
        assert_eq!(response.total_retrieved, 0);
    }

    #[test]
    fn localized_messages_differ_by_language() {
        assert_ne!(no_results_message(Language::English), no_results_message(Language::Hebrew));
        assert_ne!(pipeline_error_message(Language::English), pipeline_error_message(Language::Hebrew));
    }
}
