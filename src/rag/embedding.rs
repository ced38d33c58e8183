//! Embedding provider abstraction. Abstracted behind a
//! trait so the pipeline can be exercised against a fake in tests without a
//! live Cohere API key.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::vector::EMBEDDING_DIM;

/// Mirrors Cohere's `input_type` parameter: embeddings for a query and
/// embeddings for stored documents live in slightly different subspaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingInputType {
    SearchQuery,
    SearchDocument,
}

impl EmbeddingInputType {
    fn as_str(self) -> &'static str {
        match self {
            Self::SearchQuery => "search_query",
            Self::SearchDocument => "search_document",
        }
    }
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str, input_type: EmbeddingInputType) -> Result<Vec<f32>>;
}

#[derive(Serialize)]
struct CohereEmbedRequest<'a> {
    model: &'a str,
    texts: [&'a str; 1],
    input_type: &'a str,
    embedding_types: [&'a str; 1],
}

#[derive(Deserialize)]
struct CohereEmbedResponse {
    embeddings: CohereEmbeddings,
}

#[derive(Deserialize)]
struct CohereEmbeddings {
    float: Vec<Vec<f32>>,
}

pub struct CohereEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl CohereEmbeddingProvider {
    pub fn new(client: reqwest::Client, api_key: String, model: String) -> Self {
        Self { client, api_key, model }
    }
}

#[async_trait]
impl EmbeddingProvider for CohereEmbeddingProvider {
    async fn embed(&self, text: &str, input_type: EmbeddingInputType) -> Result<Vec<f32>> {
        let request = CohereEmbedRequest {
            model: &self.model,
            texts: [text],
            input_type: input_type.as_str(),
            embedding_types: ["float"],
        };

        let response = self
            .client
            .post("https://api.cohere.com/v2/embed")
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::internal(format!("embedding provider request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::internal(format!("embedding provider returned {}", response.status())));
        }

        let body: CohereEmbedResponse =
            response.json().await.map_err(|e| Error::internal(format!("embedding provider response malformed: {e}")))?;

        let embedding = body.embeddings.float.into_iter().next().ok_or_else(|| Error::internal("embedding provider returned no vectors"))?;

        if embedding.len() != EMBEDDING_DIM {
            return Err(Error::InvalidDimension { expected: EMBEDDING_DIM, actual: embedding.len() });
        }

        Ok(embedding)
    }
}
