//! `POST /payments/create-request` (protected) and `POST
//! /payments/webhook/{provider}` (public, no auth, no CSRF, always `200`).

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Extension, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::Result;
use crate::http::middleware::RequestContext;
use crate::http::AppState;
use crate::ids::{AppointmentId, WorkspaceId};
use crate::payments::PaymentTransaction;

#[derive(Deserialize)]
pub struct CreatePaymentRequest {
    appointment_id: AppointmentId,
    customer_email: String,
}

pub async fn create_request(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<CreatePaymentRequest>,
) -> Result<Json<PaymentTransaction>> {
    let transaction = state
        .payments
        .create_payment_request(&ctx.workspace, body.appointment_id, &body.customer_email)
        .await?;
    Ok(Json(transaction))
}

/// The webhook path carries no workspace id (providers don't template one
/// in); instead the workspace id round-trips through the `custom_fields`
/// metadata set on link creation (`PaymentService::create_payment_request`)
/// and echoed back by the provider on every webhook delivery. Every path —
/// unknown workspace, verification failure, unknown transaction — responds
/// `200` and swallows the error, so a misbehaving provider never gets a
/// signal to keep retrying.
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let header_map: HashMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_lowercase(), v.to_string())))
        .collect();

    let Some(workspace_id) = extract_webhook_workspace_id(&body) else {
        tracing::warn!(%provider, "payment webhook missing workspace identifier in payload");
        return (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })));
    };

    let workspace = match state.workspaces.find(workspace_id).await {
        Ok(workspace) => workspace,
        Err(error) => {
            tracing::warn!(%error, %provider, %workspace_id, "payment webhook referenced unknown workspace");
            return (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })));
        }
    };

    if let Err(error) = state.payments.process_webhook(&workspace, &body, &header_map).await {
        tracing::warn!(%error, %provider, %workspace_id, "payment webhook processing failed, swallowing");
    }

    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

fn extract_webhook_workspace_id(body: &[u8]) -> Option<WorkspaceId> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let raw = value.get("custom_fields")?.get("workspace_id")?.as_str()?;
    uuid::Uuid::parse_str(raw).ok().map(WorkspaceId)
}
