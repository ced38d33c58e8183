//! Retrieval step of the RAG pipeline: vector search, entity hydration, and
//! temporal weighting. Sessions and clients share the same
//! `SessionContext`/`ClientContext` shape; only sessions get the
//! exponential-decay temporal-weighting formula (`decay_rate=0.02`, clamped
//! to non-negative days) and the "pick the highest-similarity field per
//! session" rule.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::PgPool;
use time::OffsetDateTime;

use crate::clients::ClientRepository;
use crate::error::Result;
use crate::ids::{ClientId, SessionId, WorkspaceId};
use crate::sessions::SessionRepository;
use crate::vector::{ClientNoteField, ClientVectorStore, SoapField, VectorStore};

/// 0.02 ≈ a 35-day half-life.
pub const TEMPORAL_DECAY_RATE: f64 = 0.02;

#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: SessionId,
    pub client_id: ClientId,
    pub client_name: String,
    pub session_date: OffsetDateTime,
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
    pub similarity_score: f32,
    pub weighted_score: f32,
    pub matched_field: SoapField,
}

#[derive(Debug, Clone)]
pub struct ClientContext {
    pub client_id: ClientId,
    pub client_name: String,
    pub medical_history: Option<String>,
    pub notes: Option<String>,
    pub similarity_score: f32,
    pub matched_field: ClientNoteField,
}

/// Recent sessions keep most of their similarity weight; sessions months old
/// decay toward zero even if their raw cosine similarity was high.
pub fn apply_temporal_weighting(similarity: f32, session_date: OffsetDateTime, now: OffsetDateTime) -> f32 {
    let days_ago = (now - session_date).whole_days().max(0) as f64;
    let recency_weight = (-TEMPORAL_DECAY_RATE * days_ago).exp();
    similarity * recency_weight as f32
}

fn client_display_name(first_name: &str, last_name: &str) -> String {
    format!("{first_name} {last_name}").trim().to_string()
}

pub struct RetrievalService {
    pool: PgPool,
    vector_store: Arc<dyn VectorStore>,
    client_vector_store: Arc<dyn ClientVectorStore>,
    sessions: SessionRepository,
    clients: ClientRepository,
}

impl RetrievalService {
    pub fn new(
        pool: PgPool,
        vector_store: Arc<dyn VectorStore>,
        client_vector_store: Arc<dyn ClientVectorStore>,
        sessions: SessionRepository,
        clients: ClientRepository,
    ) -> Self {
        Self { pool, vector_store, client_vector_store, sessions, clients }
    }

    /// Searches session vectors, hydrates the winning sessions, keeps only
    /// the highest-similarity field per session, applies temporal weighting,
    /// and orders by weighted score descending.
    pub async fn retrieve_relevant_sessions(
        &self,
        workspace_id: WorkspaceId,
        query_embedding: &[f32],
        limit: u32,
        min_similarity: f32,
        client_id: Option<ClientId>,
    ) -> Result<Vec<SessionContext>> {
        let matches = self
            .vector_store
            .search_session_similar(workspace_id, query_embedding, limit, None, min_similarity)
            .await?;

        let mut best_per_session: HashMap<SessionId, (SoapField, f32)> = HashMap::new();
        for m in matches {
            best_per_session
                .entry(m.session_id)
                .and_modify(|(field, similarity)| {
                    if m.similarity > *similarity {
                        *field = m.field;
                        *similarity = m.similarity;
                    }
                })
                .or_insert((m.field, m.similarity));
        }

        if best_per_session.is_empty() {
            return Ok(Vec::new());
        }

        let session_ids: Vec<SessionId> = best_per_session.keys().copied().collect();
        let sessions = self.sessions.find_many(&self.pool, workspace_id, &session_ids).await?;

        let client_ids: Vec<ClientId> = sessions.iter().map(|s| s.client_id).collect();
        let clients = self.clients.find_many(workspace_id, &client_ids).await?;
        let client_names: HashMap<ClientId, String> =
            clients.iter().map(|c| (c.id, client_display_name(&c.first_name, &c.last_name))).collect();

        let now = crate::time_util::now();
        let mut contexts: Vec<SessionContext> = sessions
            .into_iter()
            .filter(|session| client_id.map_or(true, |filter_id| session.client_id == filter_id))
            .filter_map(|session| {
                let (matched_field, similarity_score) = *best_per_session.get(&session.id)?;
                let weighted_score = apply_temporal_weighting(similarity_score, session.created_at, now);
                Some(SessionContext {
                    session_id: session.id,
                    client_id: session.client_id,
                    client_name: client_names.get(&session.client_id).cloned().unwrap_or_else(|| "Unknown".to_string()),
                    session_date: session.created_at,
                    subjective: session.subjective,
                    objective: session.objective,
                    assessment: session.assessment,
                    plan: session.plan,
                    similarity_score,
                    weighted_score,
                    matched_field,
                })
            })
            .collect();

        contexts.sort_by(|a, b| b.weighted_score.partial_cmp(&a.weighted_score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(contexts)
    }

    /// Searches client-profile vectors; no temporal weighting (client
    /// profiles don't decay the way session notes do).
    pub async fn retrieve_client_contexts(
        &self,
        workspace_id: WorkspaceId,
        query_embedding: &[f32],
        limit: u32,
        min_similarity: f32,
        client_id: Option<ClientId>,
    ) -> Result<Vec<ClientContext>> {
        let matches = self.client_vector_store.search_client_similar(workspace_id, query_embedding, limit, min_similarity).await?;

        let mut best_per_client: HashMap<ClientId, (ClientNoteField, f32)> = HashMap::new();
        for m in matches {
            if let Some(filter_id) = client_id {
                if m.client_id != filter_id {
                    continue;
                }
            }
            best_per_client
                .entry(m.client_id)
                .and_modify(|(field, similarity)| {
                    if m.similarity > *similarity {
                        *field = m.field;
                        *similarity = m.similarity;
                    }
                })
                .or_insert((m.field, m.similarity));
        }

        if best_per_client.is_empty() {
            return Ok(Vec::new());
        }

        let client_ids: Vec<ClientId> = best_per_client.keys().copied().collect();
        let clients = self.clients.find_many(workspace_id, &client_ids).await?;

        let mut contexts: Vec<ClientContext> = clients
            .into_iter()
            .filter_map(|client| {
                let (matched_field, similarity_score) = *best_per_client.get(&client.id)?;
                Some(ClientContext {
                    client_id: client.id,
                    client_name: client_display_name(&client.first_name, &client.last_name),
                    medical_history: client.medical_history,
                    notes: client.notes,
                    similarity_score,
                    matched_field,
                })
            })
            .collect();

        contexts.sort_by(|a, b| b.similarity_score.partial_cmp(&a.similarity_score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(contexts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn recent_session_keeps_most_weight() {
        let now = crate::time_util::now();
        let weighted = apply_temporal_weighting(0.9, now - Duration::days(7), now);
        assert!(weighted > 0.9 * 0.85 && weighted < 0.9);
    }

    #[test]
    fn old_session_decays_heavily() {
        let now = crate::time_util::now();
        let weighted = apply_temporal_weighting(0.9, now - Duration::days(180), now);
        assert!(weighted < 0.9 * 0.05);
    }

    #[test]
    fn future_session_date_gets_no_penalty() {
        let now = crate::time_util::now();
        let weighted = apply_temporal_weighting(0.9, now + Duration::days(1), now);
        assert!((weighted - 0.9).abs() < 1e-6);
    }
}
