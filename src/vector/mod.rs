//! 1536-dimensional embedding storage and cosine-similarity search.
//! Workspace isolation is enforced on every query; the field name restricts
//! which SOAP section (or, for clients, which note field) an embedding was
//! derived from. Both the session and client vector stores share the same
//! dimension/limit/similarity validation and the same `(1 - cosine_distance)`
//! convention for the similarity score; `delete_for` exists for explicit
//! re-embedding since cascade deletion normally handles the common case.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::{Error, Result};
use crate::ids::{ClientId, SessionId, WorkspaceId};

pub const EMBEDDING_DIM: usize = 1536;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoapField {
    Subjective,
    Objective,
    Assessment,
    Plan,
}

impl SoapField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subjective => "subjective",
            Self::Objective => "objective",
            Self::Assessment => "assessment",
            Self::Plan => "plan",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "subjective" => Some(Self::Subjective),
            "objective" => Some(Self::Objective),
            "assessment" => Some(Self::Assessment),
            "plan" => Some(Self::Plan),
            _ => None,
        }
    }
}

fn validate_embedding(embedding: &[f32]) -> Result<()> {
    if embedding.len() != EMBEDDING_DIM {
        return Err(Error::InvalidDimension { expected: EMBEDDING_DIM, actual: embedding.len() });
    }
    Ok(())
}

fn validate_search_params(limit: u32, min_similarity: f32) -> Result<()> {
    if !(1..=100).contains(&limit) {
        return Err(Error::unprocessable(format!("limit must be between 1 and 100, got {limit}")));
    }
    if !(0.0..=1.0).contains(&min_similarity) {
        return Err(Error::unprocessable(format!("min_similarity must be between 0.0 and 1.0, got {min_similarity}")));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct SessionVectorMatch {
    pub session_id: SessionId,
    pub field: SoapField,
    pub similarity: f32,
}

/// `ClientVector.field_name` is drawn from a different set than session
/// vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientNoteField {
    MedicalHistory,
    Notes,
}

impl ClientNoteField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MedicalHistory => "medical_history",
            Self::Notes => "notes",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "medical_history" => Some(Self::MedicalHistory),
            "notes" => Some(Self::Notes),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientVectorMatch {
    pub client_id: ClientId,
    pub field: ClientNoteField,
    pub similarity: f32,
}

/// Abstracted so the RAG pipeline can be tested against an in-memory
/// implementation without a pgvector-enabled Postgres instance.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn insert_session_embedding(
        &self,
        workspace_id: WorkspaceId,
        session_id: SessionId,
        field: SoapField,
        embedding: Vec<f32>,
    ) -> Result<()>;

    async fn insert_session_embeddings_batch(
        &self,
        workspace_id: WorkspaceId,
        session_id: SessionId,
        embeddings: Vec<(SoapField, Vec<f32>)>,
    ) -> Result<()>;

    async fn search_session_similar(
        &self,
        workspace_id: WorkspaceId,
        query_embedding: &[f32],
        limit: u32,
        field: Option<SoapField>,
        min_similarity: f32,
    ) -> Result<Vec<SessionVectorMatch>>;

    async fn delete_session_embeddings(&self, workspace_id: WorkspaceId, session_id: SessionId) -> Result<u64>;

    async fn count_session_embeddings(&self, workspace_id: WorkspaceId, session_id: SessionId) -> Result<i64>;
}

/// pgvector-backed implementation. Embedding columns are assumed to be
/// `vector(1536)`; the `<=>` operator is pgvector's cosine-distance operator,
/// so similarity is `1 - distance`.
pub struct PgVectorStore {
    pool: PgPool,
}

impl PgVectorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_pgvector_literal(embedding: &[f32]) -> String {
    let mut out = String::with_capacity(embedding.len() * 10 + 2);
    out.push('[');
    for (i, v) in embedding.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&v.to_string());
    }
    out.push(']');
    out
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn insert_session_embedding(
        &self,
        workspace_id: WorkspaceId,
        session_id: SessionId,
        field: SoapField,
        embedding: Vec<f32>,
    ) -> Result<()> {
        validate_embedding(&embedding)?;
        sqlx::query(
            "INSERT INTO session_vectors (id, workspace_id, session_id, field_name, embedding, created_at) \
             VALUES (gen_random_uuid(), $1, $2, $3, $4::vector, now())",
        )
        .bind(workspace_id.0)
        .bind(session_id.0)
        .bind(field.as_str())
        .bind(to_pgvector_literal(&embedding))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_session_embeddings_batch(
        &self,
        workspace_id: WorkspaceId,
        session_id: SessionId,
        embeddings: Vec<(SoapField, Vec<f32>)>,
    ) -> Result<()> {
        for (_, embedding) in &embeddings {
            validate_embedding(embedding)?;
        }

        let mut tx = self.pool.begin().await?;
        for (field, embedding) in embeddings {
            sqlx::query(
                "INSERT INTO session_vectors (id, workspace_id, session_id, field_name, embedding, created_at) \
                 VALUES (gen_random_uuid(), $1, $2, $3, $4::vector, now())",
            )
            .bind(workspace_id.0)
            .bind(session_id.0)
            .bind(field.as_str())
            .bind(to_pgvector_literal(&embedding))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn search_session_similar(
        &self,
        workspace_id: WorkspaceId,
        query_embedding: &[f32],
        limit: u32,
        field: Option<SoapField>,
        min_similarity: f32,
    ) -> Result<Vec<SessionVectorMatch>> {
        validate_embedding(query_embedding)?;
        validate_search_params(limit, min_similarity)?;

        let literal = to_pgvector_literal(query_embedding);
        let rows: Vec<(uuid::Uuid, String, f64)> = sqlx::query_as(
            "SELECT session_id, field_name, 1 - (embedding <=> $1::vector) AS similarity \
             FROM session_vectors \
             WHERE workspace_id = $2 \
               AND ($3::text IS NULL OR field_name = $3) \
               AND 1 - (embedding <=> $1::vector) >= $4 \
             ORDER BY similarity DESC \
             LIMIT $5",
        )
        .bind(&literal)
        .bind(workspace_id.0)
        .bind(field.map(SoapField::as_str))
        .bind(min_similarity as f64)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(session_id, field_name, similarity)| {
                SoapField::parse(&field_name).map(|field| SessionVectorMatch {
                    session_id: SessionId(session_id),
                    field,
                    similarity: similarity as f32,
                })
            })
            .collect())
    }

    async fn delete_session_embeddings(&self, workspace_id: WorkspaceId, session_id: SessionId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM session_vectors WHERE workspace_id = $1 AND session_id = $2")
            .bind(workspace_id.0)
            .bind(session_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_session_embeddings(&self, workspace_id: WorkspaceId, session_id: SessionId) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM session_vectors WHERE workspace_id = $1 AND session_id = $2",
        )
        .bind(workspace_id.0)
        .bind(session_id.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

/// Client-note embeddings share the same
/// validation rules but are a distinct table — a client's notes and a
/// session's SOAP text are never mixed in one similarity search.
#[async_trait]
pub trait ClientVectorStore: Send + Sync {
    async fn insert_client_embedding(
        &self,
        workspace_id: WorkspaceId,
        client_id: ClientId,
        field: ClientNoteField,
        embedding: Vec<f32>,
    ) -> Result<()>;

    async fn search_client_similar(
        &self,
        workspace_id: WorkspaceId,
        query_embedding: &[f32],
        limit: u32,
        min_similarity: f32,
    ) -> Result<Vec<ClientVectorMatch>>;

    async fn delete_client_embeddings(&self, workspace_id: WorkspaceId, client_id: ClientId) -> Result<u64>;
}

#[async_trait]
impl ClientVectorStore for PgVectorStore {
    async fn insert_client_embedding(
        &self,
        workspace_id: WorkspaceId,
        client_id: ClientId,
        field: ClientNoteField,
        embedding: Vec<f32>,
    ) -> Result<()> {
        validate_embedding(&embedding)?;
        sqlx::query(
            "INSERT INTO client_vectors (id, workspace_id, client_id, field_name, embedding, created_at) \
             VALUES (gen_random_uuid(), $1, $2, $3, $4::vector, now())",
        )
        .bind(workspace_id.0)
        .bind(client_id.0)
        .bind(field.as_str())
        .bind(to_pgvector_literal(&embedding))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn search_client_similar(
        &self,
        workspace_id: WorkspaceId,
        query_embedding: &[f32],
        limit: u32,
        min_similarity: f32,
    ) -> Result<Vec<ClientVectorMatch>> {
        validate_embedding(query_embedding)?;
        validate_search_params(limit, min_similarity)?;

        let literal = to_pgvector_literal(query_embedding);
        let rows: Vec<(uuid::Uuid, String, f64)> = sqlx::query_as(
            "SELECT client_id, field_name, 1 - (embedding <=> $1::vector) AS similarity \
             FROM client_vectors \
             WHERE workspace_id = $2 AND 1 - (embedding <=> $1::vector) >= $3 \
             ORDER BY similarity DESC \
             LIMIT $4",
        )
        .bind(&literal)
        .bind(workspace_id.0)
        .bind(min_similarity as f64)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(client_id, field_name, similarity)| {
                ClientNoteField::parse(&field_name).map(|field| ClientVectorMatch {
                    client_id: ClientId(client_id),
                    field,
                    similarity: similarity as f32,
                })
            })
            .collect())
    }

    async fn delete_client_embeddings(&self, workspace_id: WorkspaceId, client_id: ClientId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM client_vectors WHERE workspace_id = $1 AND client_id = $2")
            .bind(workspace_id.0)
            .bind(client_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
