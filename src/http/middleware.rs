//! Request-level middleware, layered so the CSRF double-submit check runs
//! first, then bearer-token identity resolution, so an unauthenticated
//! mutation is rejected `403` rather than `401`.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Method, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::Error;
use crate::http::AppState;
use crate::identity::{csrf, Identity};
use crate::workspace::Workspace;

/// The resolved caller, attached to request extensions by
/// [`identity_middleware`] and read back out by every protected handler.
#[derive(Clone)]
pub struct RequestContext {
    pub identity: Identity,
    pub workspace: Workspace,
}

/// CSRF applies to state-changing requests only; `GET`/`HEAD` pass straight
/// through.
pub async fn csrf_middleware(State(state): State<Arc<AppState>>, req: Request<Body>, next: Next) -> Response {
    if matches!(*req.method(), Method::GET | Method::HEAD) {
        return next.run(req).await;
    }

    let cookie_header = req.headers().get(header::COOKIE).and_then(|v| v.to_str().ok());
    let csrf_header = req.headers().get(csrf::header_name()).and_then(|v| v.to_str().ok());

    if !csrf::verify(&state.csrf_signing_key, cookie_header, csrf_header) {
        return Error::Forbidden.into_response();
    }

    next.run(req).await
}

/// Resolves `Authorization: Bearer <token>` into a [`RequestContext`],
/// rejecting with `401` if missing or invalid. Runs after CSRF so a
/// CSRF-less mutation never reaches token verification.
pub async fn identity_middleware(State(state): State<Arc<AppState>>, mut req: Request<Body>, next: Next) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = token else {
        return Error::Unauthenticated.into_response();
    };

    match state.identity.resolve(token).await {
        Ok((identity, workspace)) => {
            req.extensions_mut().insert(RequestContext { identity, workspace });
            next.run(req).await
        }
        Err(error) => error.into_response(),
    }
}

/// Thin cross-cutting access log for mutating requests, distinct from the
/// PHI-safe business trail `AuditSink` writes (that one records what
/// changed; this one records that a request happened). Kept as a separate
/// concern rather than folded into `AuditSink` so business audit entries
/// never end up carrying request-plumbing fields like status codes.
pub async fn access_log_middleware(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let response = next.run(req).await;

    if !matches!(method, Method::GET | Method::HEAD) {
        tracing::info!(%method, %path, status = response.status().as_u16(), "request completed");
    }

    response
}
