//! HTTP server entry point: load settings from the environment, wire every
//! repository/service once, hand the bundle to `http::build_router`, serve.

use std::sync::Arc;

use pazpaz::appointments::AppointmentRepository;
use pazpaz::audit::AuditSink;
use pazpaz::circuit_breaker::CircuitBreakerRegistry;
use pazpaz::clients::ClientRepository;
use pazpaz::config::Settings;
use pazpaz::crypto::keystore::InMemorySecretStore;
use pazpaz::crypto::KeyRing;
use pazpaz::db;
use pazpaz::http::{self, AppState};
use pazpaz::identity::jwt::JwtIssuer;
use pazpaz::identity::magic_link::MagicLinkService;
use pazpaz::identity::IdentityResolver;
use pazpaz::kv::redis_store::RedisFastStore;
use pazpaz::kv::FastStore;
use pazpaz::payments::service::{NoopNotifier, PaymentService};
use pazpaz::payments::PaymentTransactionRepository;
use pazpaz::rag::cache::ResponseCache;
use pazpaz::rag::embedding::CohereEmbeddingProvider;
use pazpaz::rag::retrieval::RetrievalService;
use pazpaz::rag::synthesis::CohereChatProvider;
use pazpaz::rag::RagPipeline;
use pazpaz::ratelimit::RateLimiter;
use pazpaz::sessions::version::SessionVersionRepository;
use pazpaz::sessions::{SessionRepository, SessionService};
use pazpaz::users::UserRepository;
use pazpaz::vector::PgVectorStore;
use pazpaz::workspace::WorkspaceRepository;
use pazpaz::Result;

#[tokio::main]
async fn main() -> Result<()> {
    pazpaz::telemetry::init();

    let settings = Settings::from_env()?;
    let pool = db::connect(&settings.database_url).await?;

    let store: Arc<dyn FastStore> = Arc::new(RedisFastStore::connect(&settings.redis_url).await?);

    let secret_store = Arc::new(InMemorySecretStore::new(settings.encryption_keys.clone()));
    let keyring = KeyRing::new(secret_store, settings.active_encryption_key_version.clone());

    let jwt = Arc::new(JwtIssuer::new(settings.jwt_signing_key.clone(), store.clone()));
    let identity = IdentityResolver::new(jwt.clone(), WorkspaceRepository::new(pool.clone()));

    let magic_link = MagicLinkService::new(
        store.clone(),
        Arc::new(keyring.clone()),
        UserRepository::new(pool.clone()),
        WorkspaceRepository::new(pool.clone()),
    );

    let session_service = SessionService::new(
        pool.clone(),
        SessionRepository::new(keyring.clone()),
        SessionVersionRepository::new(pool.clone()),
        AppointmentRepository::new(pool.clone()),
        AuditSink::new(pool.clone()),
        RateLimiter::new(store.clone()),
    );

    let payments = PaymentService::new(
        pool.clone(),
        PaymentTransactionRepository::new(pool.clone()),
        AppointmentRepository::new(pool.clone()),
        ClientRepository::new(pool.clone(), keyring.clone()),
        WorkspaceRepository::new(pool.clone()),
        store.clone(),
        Arc::new(NoopNotifier),
    );

    // Per-phase timeouts; the LLM chat endpoint gets the long end of the
    // read-timeout range, embeddings the short end, so one client suffices
    // for both at the longer bound.
    let http_client = reqwest::Client::builder()
        .connect_timeout(std::time::Duration::from_secs(5))
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(|e| pazpaz::Error::internal(format!("failed to build HTTP client: {e}")))?;

    let vector_store = Arc::new(PgVectorStore::new(pool.clone()));
    let retrieval = Arc::new(RetrievalService::new(
        pool.clone(),
        vector_store.clone(),
        vector_store,
        SessionRepository::new(keyring.clone()),
        ClientRepository::new(pool.clone(), keyring.clone()),
    ));
    let embedding_provider = CohereEmbeddingProvider::new(
        http_client.clone(),
        settings.embedding_api_key.clone(),
        settings.embedding_model.clone(),
    );
    let llm_provider = CohereChatProvider::new(http_client, settings.llm_api_key.clone(), settings.llm_model.clone());
    let rag = RagPipeline::new(
        Arc::new(embedding_provider),
        Arc::new(llm_provider),
        CircuitBreakerRegistry::new(5, 60),
        retrieval,
        ResponseCache::new(store.clone()),
        Arc::new(AuditSink::new(pool.clone())),
    );

    let state = Arc::new(AppState {
        pool: pool.clone(),
        identity,
        jwt,
        magic_link,
        csrf_signing_key: settings.csrf_signing_key.clone(),
        workspaces: WorkspaceRepository::new(pool.clone()),
        clients: ClientRepository::new(pool.clone(), keyring.clone()),
        appointments: AppointmentRepository::new(pool.clone()),
        sessions: session_service,
        session_repo: SessionRepository::new(keyring.clone()),
        payments,
        rag,
        audit: AuditSink::new(pool.clone()),
    });

    let app = http::build_router(state);

    let listener = tokio::net::TcpListener::bind((settings.bind_host.as_str(), settings.bind_port)).await?;
    tracing::info!(host = %settings.bind_host, port = settings.bind_port, "pazpaz-server listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
