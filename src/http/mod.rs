//! HTTP surface assembly: one `AppState` shared via `Arc`, routes grouped
//! into a protected router (CSRF + identity layers) and a public router
//! (webhooks, magic-link issuance/verification), merged and wrapped in a
//! trace layer.

pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::appointments::AppointmentRepository;
use crate::audit::AuditSink;
use crate::clients::ClientRepository;
use crate::identity::jwt::JwtIssuer;
use crate::identity::magic_link::MagicLinkService;
use crate::identity::IdentityResolver;
use crate::payments::service::PaymentService;
use crate::rag::RagPipeline;
use crate::sessions::{SessionRepository, SessionService};
use crate::workspace::WorkspaceRepository;

/// Everything a route handler might need, shared read-only behind one
/// `Arc`. Individual repositories/services are not `Clone` themselves —
/// wrapping the whole bundle in `Arc` once, rather than cloning each field,
/// is what lets `KeyRing`-backed repositories and the rate limiter keep
/// their single construction.
pub struct AppState {
    pub pool: PgPool,
    pub identity: IdentityResolver,
    pub jwt: Arc<JwtIssuer>,
    pub magic_link: MagicLinkService,
    pub csrf_signing_key: Vec<u8>,
    pub workspaces: WorkspaceRepository,
    pub clients: ClientRepository,
    pub appointments: AppointmentRepository,
    pub sessions: SessionService,
    pub session_repo: SessionRepository,
    pub payments: PaymentService,
    pub rag: RagPipeline,
    pub audit: AuditSink,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/appointments", post(routes::appointments::create))
        .route("/appointments/conflicts", get(routes::appointments::conflicts))
        .route("/sessions", get(routes::sessions::list).post(routes::sessions::create))
        .route("/sessions/:id", axum::routing::put(routes::sessions::update).delete(routes::sessions::soft_delete))
        .route("/sessions/:id/draft", axum::routing::patch(routes::sessions::draft_update))
        .route("/sessions/:id/finalize", post(routes::sessions::finalize))
        .route("/sessions/:id/unfinalize", post(routes::sessions::unfinalize))
        .route("/sessions/:id/restore", post(routes::sessions::restore))
        .route("/sessions/:id/permanent", axum::routing::delete(routes::sessions::permanent_delete))
        .route("/payments/create-request", post(routes::payments::create_request))
        .route("/ai/query", post(routes::rag::ask))
        .route("/auth/logout", post(routes::auth::logout))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::identity_middleware))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::csrf_middleware));

    let public = Router::new()
        .route("/payments/webhook/:provider", post(routes::payments::webhook))
        .route("/auth/magic-link", post(routes::auth::request_magic_link))
        .route("/auth/magic-link/verify", post(routes::auth::verify_magic_link));

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(axum::middleware::from_fn(middleware::access_log_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
