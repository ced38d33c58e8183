//! Background worker that hard-deletes sessions past their soft-delete
//! grace period. Runs `SessionService::purge_expired`
//! on a fixed interval; a single iteration failing logs and the loop
//! continues rather than exiting the process.

use std::time::Duration;

use pazpaz::appointments::AppointmentRepository;
use pazpaz::audit::AuditSink;
use pazpaz::config::Settings;
use pazpaz::crypto::keystore::InMemorySecretStore;
use pazpaz::crypto::KeyRing;
use pazpaz::db;
use pazpaz::kv::memory_store::InMemoryFastStore;
use pazpaz::kv::FastStore;
use pazpaz::ratelimit::RateLimiter;
use pazpaz::sessions::version::SessionVersionRepository;
use pazpaz::sessions::{SessionRepository, SessionService};
use pazpaz::Result;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    pazpaz::telemetry::init();

    let settings = Settings::from_env()?;
    let pool = db::connect(&settings.database_url).await?;

    let secret_store = Arc::new(InMemorySecretStore::new(settings.encryption_keys.clone()));
    let keyring = KeyRing::new(secret_store, settings.active_encryption_key_version.clone());

    // The purge loop never checks a rate limit or a webhook idempotency key,
    // so an in-memory store is enough here; wiring Redis would only add an
    // unused dependency for this binary.
    let store: Arc<dyn FastStore> = Arc::new(InMemoryFastStore::new());

    let session_service = SessionService::new(
        pool.clone(),
        SessionRepository::new(keyring),
        SessionVersionRepository::new(pool.clone()),
        AppointmentRepository::new(pool.clone()),
        AuditSink::new(pool.clone()),
        RateLimiter::new(store),
    );

    let interval = Duration::from_secs(settings.purge_worker_interval_secs);
    tracing::info!(interval_secs = interval.as_secs(), "pazpaz-purge-worker starting");

    loop {
        match session_service.purge_expired().await {
            Ok(purged) => {
                if purged > 0 {
                    tracing::info!(purged, "purged expired sessions");
                }
            }
            Err(error) => tracing::error!(%error, "purge cycle failed, retrying next interval"),
        }
        tokio::time::sleep(interval).await;
    }
}
