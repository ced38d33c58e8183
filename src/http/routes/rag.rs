//! `POST /ai/query` (protected): entry point for the bilingual retrieval and
//! synthesis pipeline. Every field here maps straight onto `rag::RagQuery`;
//! the pipeline itself never lets an error escape, so this handler only
//! ever returns `200`.

use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::Json;
use serde::Deserialize;

use crate::error::Result;
use crate::http::middleware::RequestContext;
use crate::http::AppState;
use crate::ids::ClientId;
use crate::rag::{RagQuery, RagResponse};

fn default_max_results() -> u32 {
    5
}

fn default_min_similarity() -> f32 {
    0.5
}

#[derive(Deserialize)]
pub struct AskRequest {
    query: String,
    client_id: Option<ClientId>,
    #[serde(default = "default_max_results")]
    max_results: u32,
    #[serde(default = "default_min_similarity")]
    min_similarity: f32,
}

pub async fn ask(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<AskRequest>,
) -> Result<Json<RagResponse>> {
    let response = state
        .rag
        .query(RagQuery {
            workspace_id: ctx.workspace.id,
            query_text: body.query,
            user_id: Some(ctx.identity.user_id),
            client_id: body.client_id,
            max_results: body.max_results,
            min_similarity: body.min_similarity,
        })
        .await;
    Ok(Json(response))
}
