//! `POST /appointments`, `GET /appointments/conflicts`.

use std::sync::Arc;

use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::appointments::{ConflictingAppointment, LocationType};
use crate::error::{Error, Result};
use crate::http::middleware::RequestContext;
use crate::http::AppState;
use crate::ids::{AppointmentId, ClientId};

#[derive(Deserialize)]
pub struct CreateAppointmentRequest {
    client_id: ClientId,
    scheduled_start: OffsetDateTime,
    scheduled_end: OffsetDateTime,
    location_type: LocationType,
    payment_price: Option<rust_decimal::Decimal>,
}

#[derive(Deserialize)]
pub struct AllowConflictQuery {
    #[serde(default)]
    allow_conflict: bool,
}

#[derive(Deserialize)]
pub struct ConflictsQuery {
    scheduled_start: OffsetDateTime,
    scheduled_end: OffsetDateTime,
    #[serde(default)]
    exclude_appointment_id: Option<AppointmentId>,
}

#[derive(Serialize)]
pub struct ConflictsResponse {
    has_conflict: bool,
    conflicting_appointments: Vec<ConflictingAppointment>,
}

/// Builds the `ConflictingAppointment` list from the raw conflict rows,
/// looking up each client just for its initials.
async fn conflicting_appointments(
    state: &AppState,
    workspace_id: crate::ids::WorkspaceId,
    conflicts: &[crate::appointments::Appointment],
) -> Result<Vec<ConflictingAppointment>> {
    let mut out = Vec::with_capacity(conflicts.len());
    for appointment in conflicts {
        let client = state.clients.find(workspace_id, appointment.client_id).await?;
        out.push(ConflictingAppointment {
            id: appointment.id,
            scheduled_start: appointment.scheduled_start,
            scheduled_end: appointment.scheduled_end,
            client_initials: client.initials(),
            location_type: appointment.location_type,
            status: appointment.status,
        });
    }
    Ok(out)
}

pub async fn conflicts(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Query(params): Query<ConflictsQuery>,
) -> Result<Json<ConflictsResponse>> {
    let rows = state
        .appointments
        .find_conflicts(ctx.workspace.id, params.scheduled_start, params.scheduled_end, params.exclude_appointment_id)
        .await?;
    let conflicting = conflicting_appointments(&state, ctx.workspace.id, &rows).await?;
    Ok(Json(ConflictsResponse { has_conflict: !conflicting.is_empty(), conflicting_appointments: conflicting }))
}

/// Create. Rejects overlapping appointments with `409
/// {conflicting_appointments:[…]}` unless `?allow_conflict=true`.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Query(allow): Query<AllowConflictQuery>,
    Json(body): Json<CreateAppointmentRequest>,
) -> Result<Response> {
    if body.scheduled_end <= body.scheduled_start {
        return Err(Error::unprocessable("scheduled_end must be after scheduled_start"));
    }

    if !allow.allow_conflict {
        let rows = state
            .appointments
            .find_conflicts(ctx.workspace.id, body.scheduled_start, body.scheduled_end, None)
            .await?;
        if !rows.is_empty() {
            let conflicting = conflicting_appointments(&state, ctx.workspace.id, &rows).await?;
            let body = ConflictsResponse { has_conflict: true, conflicting_appointments: conflicting };
            return Ok((StatusCode::CONFLICT, Json(body)).into_response());
        }
    }

    let appointment = state
        .appointments
        .create(
            ctx.workspace.id,
            body.client_id,
            body.scheduled_start,
            body.scheduled_end,
            body.location_type,
            body.payment_price,
        )
        .await?;

    state
        .audit
        .emit(crate::audit::AuditEvent {
            actor: Some(ctx.identity.user_id),
            workspace_id: ctx.workspace.id,
            action: crate::audit::AuditAction::Create,
            resource_type: "appointment",
            resource_id: Some(appointment.id.to_string()),
            metadata: serde_json::json!({}),
            ip_address: None,
        })
        .await;

    Ok((StatusCode::CREATED, Json(appointment)).into_response())
}
