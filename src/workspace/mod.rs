//! Workspace entity: the tenant root every
//! PHI-bearing entity transitively references.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};

use crate::db::scope::found_or_404;
use crate::error::Result;
use crate::ids::WorkspaceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceStatus {
    Active,
    Suspended,
    Deleted,
}

impl WorkspaceStatus {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    pub provider: Option<String>,
    /// Opaque, provider-specific config (API keys, merchant ids, ...). Values
    /// that are secrets are stored pre-encrypted by the caller; this layer
    /// treats the map as opaque JSON.
    pub provider_config: serde_json::Value,
    pub vat_rate: rust_decimal::Decimal,
    pub vat_registered: bool,
    pub payments_enabled: bool,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    pub status: WorkspaceStatus,
    pub payment_config: PaymentConfig,
    pub receipt_counter: i64,
}

pub struct WorkspaceRepository {
    pool: PgPool,
}

impl WorkspaceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, id: WorkspaceId) -> Result<Workspace> {
        let row: Option<WorkspaceRow> =
            sqlx::query_as("SELECT * FROM workspaces WHERE id = $1").bind(id.0).fetch_optional(&self.pool).await?;
        found_or_404(row, "workspace").map(Into::into)
    }

    /// Atomically allocates the next receipt number for `workspace_id`. Uses
    /// `UPDATE ... RETURNING` so the increment and read happen as one
    /// statement under the row lock Postgres takes for the update. Runs in
    /// the caller's transaction so the allocation commits (or rolls back)
    /// together with the transaction row it stamps.
    pub async fn next_receipt_number(&self, tx: &mut Transaction<'_, Postgres>, workspace_id: WorkspaceId) -> Result<i64> {
        let (receipt_number,): (i64,) = sqlx::query_as(
            "UPDATE workspaces SET receipt_counter = receipt_counter + 1 \
             WHERE id = $1 RETURNING receipt_counter",
        )
        .bind(workspace_id.0)
        .fetch_one(&mut **tx)
        .await?;
        Ok(receipt_number)
    }
}

#[derive(sqlx::FromRow)]
struct WorkspaceRow {
    id: uuid::Uuid,
    name: String,
    status: String,
    payment_provider: Option<String>,
    payment_provider_config: serde_json::Value,
    vat_rate: rust_decimal::Decimal,
    vat_registered: bool,
    payments_enabled: bool,
    currency: String,
    receipt_counter: i64,
}

impl From<WorkspaceRow> for Workspace {
    fn from(row: WorkspaceRow) -> Self {
        let status = match row.status.as_str() {
            "active" => WorkspaceStatus::Active,
            "suspended" => WorkspaceStatus::Suspended,
            _ => WorkspaceStatus::Deleted,
        };
        Workspace {
            id: WorkspaceId(row.id),
            name: row.name,
            status,
            payment_config: PaymentConfig {
                provider: row.payment_provider,
                provider_config: row.payment_provider_config,
                vat_rate: row.vat_rate,
                vat_registered: row.vat_registered,
                payments_enabled: row.payments_enabled,
                currency: row.currency,
            },
            receipt_counter: row.receipt_counter,
        }
    }
}
