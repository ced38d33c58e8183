//! Shared fixtures for the integration tests that need a live Postgres
//! instance. Callers do
//!
//! ```ignore
//! let Some(pool) = common::setup_db().await else { return };
//! ```
//!
//! so the suite degrades to a no-op rather than failing when
//! `TEST_DATABASE_URL` isn't set, instead of requiring a migrations
//! directory and a live database in every environment this runs in.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use pazpaz::crypto::keystore::InMemorySecretStore;
use pazpaz::crypto::KeyRing;
use pazpaz::ids::{AppointmentId, ClientId, WorkspaceId};
use rust_decimal::Decimal;
use sqlx::PgPool;
use time::OffsetDateTime;

pub const TEST_KEY_VERSION: &str = "v1";

/// Connects to `TEST_DATABASE_URL` if set, returning `None` otherwise. Tests
/// built against this helper are opt-in: they pass locally and in any CI
/// lane that provisions a database, and skip cleanly everywhere else.
pub async fn setup_db() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    sqlx::PgPool::connect(&url).await.ok()
}

pub fn test_keyring() -> KeyRing {
    let mut keys = HashMap::new();
    keys.insert(TEST_KEY_VERSION.to_string(), [11u8; 32]);
    KeyRing::new(Arc::new(InMemorySecretStore::new(keys)), TEST_KEY_VERSION)
}

pub struct WorkspaceFixture {
    pub id: WorkspaceId,
    pub payment_provider: Option<&'static str>,
    pub provider_config: serde_json::Value,
    pub vat_rate: Decimal,
    pub vat_registered: bool,
    pub payments_enabled: bool,
}

impl Default for WorkspaceFixture {
    fn default() -> Self {
        Self {
            id: WorkspaceId::new(),
            payment_provider: None,
            provider_config: serde_json::json!({}),
            vat_rate: Decimal::from_str("17.00").unwrap(),
            vat_registered: true,
            payments_enabled: true,
        }
    }
}

pub async fn insert_workspace(pool: &PgPool, fixture: &WorkspaceFixture) {
    sqlx::query(
        "INSERT INTO workspaces \
         (id, name, status, payment_provider, payment_provider_config, vat_rate, vat_registered, payments_enabled, currency, receipt_counter) \
         VALUES ($1, 'Test Workspace', 'active', $2, $3, $4, $5, $6, 'ILS', 0)",
    )
    .bind(fixture.id.0)
    .bind(fixture.payment_provider)
    .bind(&fixture.provider_config)
    .bind(fixture.vat_rate)
    .bind(fixture.vat_registered)
    .bind(fixture.payments_enabled)
    .execute(pool)
    .await
    .expect("insert workspace fixture");
}

fn client_aad(workspace_id: WorkspaceId, client_id: ClientId, field: &str) -> Vec<u8> {
    format!("client:{workspace_id}:{client_id}:{field}").into_bytes()
}

/// Inserts a client row with real ciphertext under `keyring`, so a
/// `ClientRepository` built with the same keyring can read it back exactly
/// as `ClientRepository::find` would for a row written by the application.
pub async fn insert_client(
    pool: &PgPool,
    keyring: &KeyRing,
    workspace_id: WorkspaceId,
    first_name: &str,
    last_name: &str,
) -> ClientId {
    let id = ClientId::new();
    let first_name_enc = pazpaz::crypto::encrypt_field(keyring, first_name, &client_aad(workspace_id, id, "first_name"))
        .await
        .expect("encrypt first_name fixture");
    let last_name_enc = pazpaz::crypto::encrypt_field(keyring, last_name, &client_aad(workspace_id, id, "last_name"))
        .await
        .expect("encrypt last_name fixture");

    sqlx::query(
        "INSERT INTO clients \
         (id, workspace_id, first_name_enc, last_name_enc, email_enc, phone_enc, address_enc, \
          medical_history_enc, emergency_contact_enc, notes_enc, date_of_birth, consent_given, is_active, tags) \
         VALUES ($1, $2, $3, $4, NULL, NULL, NULL, NULL, NULL, NULL, NULL, true, true, '{}')",
    )
    .bind(id.0)
    .bind(workspace_id.0)
    .bind(first_name_enc)
    .bind(last_name_enc)
    .execute(pool)
    .await
    .expect("insert client fixture");

    id
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_appointment(
    pool: &PgPool,
    workspace_id: WorkspaceId,
    client_id: ClientId,
    scheduled_start: OffsetDateTime,
    scheduled_end: OffsetDateTime,
    status: &str,
    payment_price: Option<Decimal>,
) -> AppointmentId {
    let id = AppointmentId::new();
    sqlx::query(
        "INSERT INTO appointments \
         (id, workspace_id, client_id, scheduled_start, scheduled_end, location_type, \
          status, payment_price, payment_status, payment_method, paid_at, edit_count) \
         VALUES ($1, $2, $3, $4, $5, 'clinic', $6, $7, 'unpaid', NULL, NULL, 0)",
    )
    .bind(id.0)
    .bind(workspace_id.0)
    .bind(client_id.0)
    .bind(scheduled_start)
    .bind(scheduled_end)
    .bind(status)
    .bind(payment_price)
    .execute(pool)
    .await
    .expect("insert appointment fixture");

    id
}
