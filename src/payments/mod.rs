//! Payment orchestration core: provider abstraction, VAT
//! split, and transaction/webhook lifecycle.

pub mod provider;
pub mod providers;
pub mod service;
pub mod vat;

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;

use crate::db::scope::found_or_404;
use crate::error::Result;
use crate::ids::{AppointmentId, PaymentTransactionId, WorkspaceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
    Cancelled,
}

impl TransactionStatus {
    /// A transaction in one of these states never transitions again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Refunded | Self::Cancelled)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
            Self::Cancelled => "cancelled",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "refunded" => Self::Refunded,
            "cancelled" => Self::Cancelled,
            _ => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PaymentTransaction {
    pub id: PaymentTransactionId,
    pub workspace_id: WorkspaceId,
    pub appointment_id: Option<AppointmentId>,
    pub base_amount: Decimal,
    pub vat_amount: Decimal,
    pub total_amount: Decimal,
    pub currency: String,
    pub payment_method: String,
    pub status: TransactionStatus,
    pub provider: String,
    pub provider_transaction_id: Option<String>,
    pub provider_payment_link: Option<String>,
    pub receipt_number: Option<i64>,
    pub created_at: OffsetDateTime,
    pub completed_at: Option<OffsetDateTime>,
    pub failed_at: Option<OffsetDateTime>,
    pub refunded_at: Option<OffsetDateTime>,
    pub failure_reason: Option<String>,
    pub provider_metadata: Option<serde_json::Value>,
}

#[derive(sqlx::FromRow)]
struct PaymentTransactionRow {
    id: uuid::Uuid,
    workspace_id: uuid::Uuid,
    appointment_id: Option<uuid::Uuid>,
    base_amount: Decimal,
    vat_amount: Decimal,
    total_amount: Decimal,
    currency: String,
    payment_method: String,
    status: String,
    provider: String,
    provider_transaction_id: Option<String>,
    provider_payment_link: Option<String>,
    receipt_number: Option<i64>,
    created_at: OffsetDateTime,
    completed_at: Option<OffsetDateTime>,
    failed_at: Option<OffsetDateTime>,
    refunded_at: Option<OffsetDateTime>,
    failure_reason: Option<String>,
    provider_metadata: Option<serde_json::Value>,
}

impl From<PaymentTransactionRow> for PaymentTransaction {
    fn from(row: PaymentTransactionRow) -> Self {
        PaymentTransaction {
            id: PaymentTransactionId(row.id),
            workspace_id: WorkspaceId(row.workspace_id),
            appointment_id: row.appointment_id.map(AppointmentId),
            base_amount: row.base_amount,
            vat_amount: row.vat_amount,
            total_amount: row.total_amount,
            currency: row.currency,
            payment_method: row.payment_method,
            status: TransactionStatus::parse(&row.status),
            provider: row.provider,
            provider_transaction_id: row.provider_transaction_id,
            provider_payment_link: row.provider_payment_link,
            receipt_number: row.receipt_number,
            created_at: row.created_at,
            completed_at: row.completed_at,
            failed_at: row.failed_at,
            refunded_at: row.refunded_at,
            failure_reason: row.failure_reason,
            provider_metadata: row.provider_metadata,
        }
    }
}

pub struct PaymentTransactionRepository {
    pool: PgPool,
}

impl PaymentTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, tx: &mut Transaction<'_, Postgres>, transaction: &PaymentTransaction) -> Result<()> {
        sqlx::query(
            "INSERT INTO payment_transactions \
             (id, workspace_id, appointment_id, base_amount, vat_amount, total_amount, currency, \
              payment_method, status, provider, provider_transaction_id, provider_payment_link, \
              receipt_number, created_at, completed_at, failed_at, refunded_at, failure_reason, provider_metadata) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19)",
        )
        .bind(transaction.id.0)
        .bind(transaction.workspace_id.0)
        .bind(transaction.appointment_id.map(|id| id.0))
        .bind(transaction.base_amount)
        .bind(transaction.vat_amount)
        .bind(transaction.total_amount)
        .bind(&transaction.currency)
        .bind(&transaction.payment_method)
        .bind(transaction.status.as_str())
        .bind(&transaction.provider)
        .bind(&transaction.provider_transaction_id)
        .bind(&transaction.provider_payment_link)
        .bind(transaction.receipt_number)
        .bind(transaction.created_at)
        .bind(transaction.completed_at)
        .bind(transaction.failed_at)
        .bind(transaction.refunded_at)
        .bind(&transaction.failure_reason)
        .bind(&transaction.provider_metadata)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn find(&self, workspace_id: WorkspaceId, id: PaymentTransactionId) -> Result<PaymentTransaction> {
        let row: Option<PaymentTransactionRow> =
            sqlx::query_as("SELECT * FROM payment_transactions WHERE id = $1 AND workspace_id = $2")
                .bind(id.0)
                .bind(workspace_id.0)
                .fetch_optional(&self.pool)
                .await?;
        found_or_404(row, "payment_transaction").map(Into::into)
    }

    pub async fn find_by_provider_transaction_id(
        &self,
        workspace_id: WorkspaceId,
        provider_transaction_id: &str,
    ) -> Result<Option<PaymentTransaction>> {
        let row: Option<PaymentTransactionRow> = sqlx::query_as(
            "SELECT * FROM payment_transactions WHERE workspace_id = $1 AND provider_transaction_id = $2",
        )
        .bind(workspace_id.0)
        .bind(provider_transaction_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Applies a status transition guarded by the monotonic-terminal-state
    /// rule: a transaction already in
    /// `completed`/`refunded`/`cancelled` is left untouched regardless of
    /// what this call asked for, and the row as it stands is returned.
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_status_transition(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        workspace_id: WorkspaceId,
        id: PaymentTransactionId,
        status: TransactionStatus,
        completed_at: Option<OffsetDateTime>,
        failed_at: Option<OffsetDateTime>,
        refunded_at: Option<OffsetDateTime>,
        failure_reason: Option<String>,
        provider_metadata: Option<serde_json::Value>,
    ) -> Result<PaymentTransaction> {
        let row: Option<PaymentTransactionRow> = sqlx::query_as(
            "UPDATE payment_transactions \
             SET status = $1, \
                 completed_at = COALESCE($2, completed_at), \
                 failed_at = COALESCE($3, failed_at), \
                 refunded_at = COALESCE($4, refunded_at), \
                 failure_reason = COALESCE($5, failure_reason), \
                 provider_metadata = COALESCE($6, provider_metadata) \
             WHERE id = $7 AND workspace_id = $8 \
               AND status NOT IN ('completed', 'refunded', 'cancelled') \
             RETURNING *",
        )
        .bind(status.as_str())
        .bind(completed_at)
        .bind(failed_at)
        .bind(refunded_at)
        .bind(failure_reason)
        .bind(provider_metadata)
        .bind(id.0)
        .bind(workspace_id.0)
        .fetch_optional(&mut **tx)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => self.find_in_tx(tx, workspace_id, id).await,
        }
    }

    /// Stamps the receipt number allocated from `workspace.receipt_counter`
    /// onto a just-completed
    /// transaction. Guarded by `receipt_number IS NULL` so a replayed
    /// completion (already handled upstream by the monotonic status guard,
    /// but cheap to double-guard here) never allocates a second number for
    /// the same transaction.
    pub async fn set_receipt_number(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        workspace_id: WorkspaceId,
        id: PaymentTransactionId,
        receipt_number: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE payment_transactions SET receipt_number = $1 \
             WHERE id = $2 AND workspace_id = $3 AND receipt_number IS NULL",
        )
        .bind(receipt_number)
        .bind(id.0)
        .bind(workspace_id.0)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn find_in_tx(&self, tx: &mut Transaction<'_, Postgres>, workspace_id: WorkspaceId, id: PaymentTransactionId) -> Result<PaymentTransaction> {
        let row: Option<PaymentTransactionRow> =
            sqlx::query_as("SELECT * FROM payment_transactions WHERE id = $1 AND workspace_id = $2")
                .bind(id.0)
                .bind(workspace_id.0)
                .fetch_optional(&mut **tx)
                .await?;
        found_or_404(row, "payment_transaction").map(Into::into)
    }
}
