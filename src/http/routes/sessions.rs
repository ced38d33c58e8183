//! Session lifecycle routes: create, draft autosave, finalize,
//! unfinalize, amend-or-draft-update, soft-delete, restore, permanent
//! delete, and the paginated/search list.

use std::sync::Arc;

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::audit::{AuditAction, AuditEvent};
use crate::error::Result;
use crate::http::middleware::RequestContext;
use crate::http::AppState;
use crate::ids::{AppointmentId, ClientId, SessionId};
use crate::sessions::{matches_search, Session, SoapPatch};

#[derive(Serialize)]
pub struct SessionResponse {
    pub id: SessionId,
    pub client_id: ClientId,
    pub appointment_id: Option<AppointmentId>,
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
    pub is_draft: bool,
    pub version: i32,
    pub created_at: OffsetDateTime,
    pub finalized_at: Option<OffsetDateTime>,
    pub amended_at: Option<OffsetDateTime>,
    pub amendment_count: i32,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            client_id: session.client_id,
            appointment_id: session.appointment_id,
            subjective: session.subjective.clone(),
            objective: session.objective.clone(),
            assessment: session.assessment.clone(),
            plan: session.plan.clone(),
            is_draft: session.is_draft,
            version: session.version,
            created_at: session.created_at,
            finalized_at: session.finalized_at,
            amended_at: session.amended_at,
            amendment_count: session.amendment_count,
        }
    }
}

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    client_id: ClientId,
    appointment_id: Option<AppointmentId>,
    subjective: Option<String>,
    objective: Option<String>,
    assessment: Option<String>,
    plan: Option<String>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<Response> {
    let patch = SoapPatch {
        subjective: body.subjective,
        objective: body.objective,
        assessment: body.assessment,
        plan: body.plan,
    };
    let session = state
        .sessions
        .create(ctx.workspace.id, body.client_id, body.appointment_id, patch, ctx.identity.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(SessionResponse::from(&session))).into_response())
}

#[derive(Deserialize)]
pub struct SoapPatchRequest {
    subjective: Option<String>,
    objective: Option<String>,
    assessment: Option<String>,
    plan: Option<String>,
    version: i32,
}

pub async fn draft_update(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<SessionId>,
    Json(body): Json<SoapPatchRequest>,
) -> Result<Json<SessionResponse>> {
    let patch = SoapPatch {
        subjective: body.subjective,
        objective: body.objective,
        assessment: body.assessment,
        plan: body.plan,
    };
    let session = state.sessions.draft_update(ctx.workspace.id, id, ctx.identity.user_id, patch, body.version).await?;
    Ok(Json(SessionResponse::from(&session)))
}

/// `PUT /sessions/{id}`: amends if the session is already finalized
/// (snapshotting first), otherwise a normal draft update.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<SessionId>,
    Json(body): Json<SoapPatchRequest>,
) -> Result<Json<SessionResponse>> {
    let current = state.session_repo.find(&state.pool, ctx.workspace.id, id).await?;
    let patch = SoapPatch {
        subjective: body.subjective,
        objective: body.objective,
        assessment: body.assessment,
        plan: body.plan,
    };

    let session = if current.finalized_at.is_some() {
        state.sessions.amend(ctx.workspace.id, id, ctx.identity.user_id, patch, body.version).await?
    } else {
        state.sessions.draft_update(ctx.workspace.id, id, ctx.identity.user_id, patch, body.version).await?
    };
    Ok(Json(SessionResponse::from(&session)))
}

#[derive(Deserialize)]
pub struct VersionedRequest {
    version: i32,
}

pub async fn finalize(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<SessionId>,
    Json(body): Json<VersionedRequest>,
) -> Result<Json<SessionResponse>> {
    let session = state.sessions.finalize(ctx.workspace.id, id, ctx.identity.user_id, body.version).await?;
    Ok(Json(SessionResponse::from(&session)))
}

pub async fn unfinalize(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<SessionId>,
    Json(body): Json<VersionedRequest>,
) -> Result<Json<SessionResponse>> {
    let session = state.sessions.unfinalize(ctx.workspace.id, id, body.version).await?;
    Ok(Json(SessionResponse::from(&session)))
}

#[derive(Deserialize)]
pub struct SoftDeleteRequest {
    reason: String,
    version: i32,
}

pub async fn soft_delete(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<SessionId>,
    Json(body): Json<SoftDeleteRequest>,
) -> Result<Json<SessionResponse>> {
    let session = state
        .sessions
        .soft_delete(ctx.workspace.id, id, ctx.identity.user_id, body.reason, body.version)
        .await?;
    Ok(Json(SessionResponse::from(&session)))
}

pub async fn restore(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<SessionId>,
    Json(body): Json<VersionedRequest>,
) -> Result<Json<SessionResponse>> {
    let session = state.sessions.restore(ctx.workspace.id, id, body.version).await?;
    Ok(Json(SessionResponse::from(&session)))
}

pub async fn permanent_delete(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<SessionId>,
) -> Result<StatusCode> {
    state.sessions.permanent_delete(ctx.workspace.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn default_limit() -> i64 {
    50
}

#[derive(Deserialize)]
pub struct ListSessionsQuery {
    client_id: Option<ClientId>,
    search: Option<String>,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

/// Paginated list; when `search` is present, decrypts and scans up to 1000
/// of the most recent sessions for a case-insensitive substring match
/// across all four SOAP fields, then paginates the matches. Emits a `Read`
/// audit event carrying the verbatim search string — never the decrypted
/// PHI it matched against.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Query(params): Query<ListSessionsQuery>,
) -> Result<Json<Vec<SessionResponse>>> {
    let sessions = if let Some(search) = &params.search {
        let candidates = state.session_repo.list(&state.pool, ctx.workspace.id, params.client_id, 1000, 0).await?;
        let matched: Vec<Session> = candidates.into_iter().filter(|s| matches_search(s, search)).collect();

        state
            .audit
            .emit(AuditEvent {
                actor: Some(ctx.identity.user_id),
                workspace_id: ctx.workspace.id,
                action: AuditAction::Read,
                resource_type: "session",
                resource_id: None,
                metadata: serde_json::json!({ "search": search, "result_count": matched.len() }),
                ip_address: None,
            })
            .await;

        matched.into_iter().skip(params.offset.max(0) as usize).take(params.limit.max(0) as usize).collect()
    } else {
        state.session_repo.list(&state.pool, ctx.workspace.id, params.client_id, params.limit, params.offset).await?
    };

    Ok(Json(sessions.iter().map(SessionResponse::from).collect()))
}
