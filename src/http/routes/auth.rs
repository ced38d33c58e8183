//! `POST /auth/magic-link` plus the verify and logout steps that
//! make the issued token usable.

use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::http::middleware::RequestContext;
use crate::http::AppState;
use crate::identity::{csrf, magic_link::VerifyOutcome};
use crate::ids::UserId;

#[derive(Deserialize)]
pub struct MagicLinkRequest {
    email: String,
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// Always responds the same way regardless of whether `email` matched an
/// active user — `MagicLinkService::request` already folds that distinction
/// away, returning `Ok(None)` rather than an error.
pub async fn request_magic_link(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<MagicLinkRequest>,
) -> Result<Json<serde_json::Value>> {
    let ip = client_ip(&headers);
    state.magic_link.request(&body.email, &ip).await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

#[derive(Deserialize)]
pub struct VerifyMagicLinkRequest {
    token: String,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyMagicLinkResponse {
    Authenticated { access_token: String, csrf_token: String },
    TwoFactorRequired { user_id: UserId },
}

/// On success, also mints a signed CSRF token (`identity::csrf::issue`) and
/// sets it as the `csrf_token` cookie; the body echoes the same value so the
/// caller's JS can mirror it into the `X-CSRF-Token` header on every
/// subsequent mutating request.
pub async fn verify_magic_link(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyMagicLinkRequest>,
) -> Result<Response> {
    let outcome = state.magic_link.verify(&body.token).await?;
    let response = match outcome {
        VerifyOutcome::Authenticated { user } => {
            let token = state.jwt.issue(user.id, user.workspace_id)?;
            let csrf_token = csrf::issue(&state.csrf_signing_key);
            let mut response = Json(VerifyMagicLinkResponse::Authenticated {
                access_token: token.token,
                csrf_token: csrf_token.clone(),
            })
            .into_response();
            if let Ok(cookie) = HeaderValue::from_str(&format!(
                "{}={csrf_token}; Path=/; SameSite=Strict; Secure",
                csrf::cookie_name()
            )) {
                response.headers_mut().insert(axum::http::header::SET_COOKIE, cookie);
            }
            response
        }
        VerifyOutcome::TwoFactorRequired { user_id } => Json(VerifyMagicLinkResponse::TwoFactorRequired { user_id }).into_response(),
    };
    Ok(response)
}

/// Blacklists the caller's current token.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(_ctx): Extension<RequestContext>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>> {
    if let Some(token) = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        state.jwt.blacklist(token).await?;
    }
    Ok(Json(serde_json::json!({ "status": "ok" })))
}
