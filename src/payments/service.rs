//! Payment service: orchestrates payment-link creation and webhook
//! settlement over the provider abstraction, step-for-step — VAT split,
//! provider call, transaction persistence, appointment status propagation,
//! webhook idempotency via the fast store, monotonic status transitions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::appointments::{AppointmentRepository, PaymentStatus};
use crate::clients::ClientRepository;
use crate::error::{Error, Result};
use crate::ids::{AppointmentId, PaymentTransactionId, WorkspaceId};
use crate::kv::FastStore;
use crate::payments::provider::{get_payment_provider, PaymentLinkRequest, WebhookPaymentData, WebhookPaymentStatus};
use crate::payments::vat::calculate_vat;
use crate::payments::{PaymentTransaction, PaymentTransactionRepository, TransactionStatus};
use crate::workspace::{Workspace, WorkspaceRepository};

const WEBHOOK_IDEMPOTENCY_TTL_SECS: u64 = 86_400;

/// The email-delivery sink is an external collaborator; the core only
/// depends on this contract. Failures are
/// always swallowed by the caller, never surfaced as a service error.
#[async_trait]
pub trait PaymentNotifier: Send + Sync {
    async fn send_payment_request_email(
        &self,
        customer_email: &str,
        customer_name: &str,
        amount: rust_decimal::Decimal,
        currency: &str,
        payment_link: &str,
    ) -> Result<()>;
}

pub struct NoopNotifier;

#[async_trait]
impl PaymentNotifier for NoopNotifier {
    async fn send_payment_request_email(
        &self,
        _customer_email: &str,
        _customer_name: &str,
        _amount: rust_decimal::Decimal,
        _currency: &str,
        _payment_link: &str,
    ) -> Result<()> {
        Ok(())
    }
}

pub struct PaymentService {
    pool: PgPool,
    transactions: PaymentTransactionRepository,
    appointments: AppointmentRepository,
    clients: ClientRepository,
    workspaces: WorkspaceRepository,
    store: Arc<dyn FastStore>,
    notifier: Arc<dyn PaymentNotifier>,
}

impl PaymentService {
    pub fn new(
        pool: PgPool,
        transactions: PaymentTransactionRepository,
        appointments: AppointmentRepository,
        clients: ClientRepository,
        workspaces: WorkspaceRepository,
        store: Arc<dyn FastStore>,
        notifier: Arc<dyn PaymentNotifier>,
    ) -> Self {
        Self { pool, transactions, appointments, clients, workspaces, store, notifier }
    }

    /// Creates a payment link and a `pending` transaction, and advances the
    /// appointment to `payment_sent`.
    /// On a provider failure, a `failed` transaction is still persisted
    /// before the typed error is re-raised.
    pub async fn create_payment_request(
        &self,
        workspace: &Workspace,
        appointment_id: AppointmentId,
        customer_email: &str,
    ) -> Result<PaymentTransaction> {
        let appointment = self.appointments.find(workspace.id, appointment_id).await?;
        let total = appointment.payment_price.ok_or_else(|| Error::invalid_amount("appointment has no price set"))?;

        if !workspace.payment_config.payments_enabled {
            return Err(Error::provider_not_configured("payments are not enabled for this workspace"));
        }

        let client = self.clients.find(workspace.id, appointment.client_id).await?;
        let customer_name = format!("{} {}", client.first_name, client.last_name).trim().to_string();

        let breakdown = match calculate_vat(total, workspace.payment_config.vat_rate, workspace.payment_config.vat_registered) {
            Ok(breakdown) => breakdown,
            Err(error) => return Err(error),
        };

        let provider_name = workspace.payment_config.provider.clone().unwrap_or_else(|| "none".to_string());
        let provider = get_payment_provider(workspace);

        let link_request = PaymentLinkRequest {
            amount: breakdown.total_amount,
            currency: workspace.payment_config.currency.clone(),
            description: format!("Appointment payment - {customer_name} - {}", appointment.scheduled_start),
            customer_email: customer_email.to_string(),
            customer_name: Some(customer_name),
            success_url: None,
            cancel_url: None,
            metadata: Some(serde_json::json!({
                "workspace_id": workspace.id.to_string(),
                "appointment_id": appointment_id.to_string(),
            })),
        };

        let link_response = match provider {
            Ok(provider) => provider.create_payment_link(&link_request).await,
            Err(error) => Err(error),
        };

        match link_response {
            Ok(link_response) => {
                let transaction = PaymentTransaction {
                    id: PaymentTransactionId::new(),
                    workspace_id: workspace.id,
                    appointment_id: Some(appointment_id),
                    base_amount: breakdown.base_amount,
                    vat_amount: breakdown.vat_amount,
                    total_amount: breakdown.total_amount,
                    currency: workspace.payment_config.currency.clone(),
                    payment_method: "online_card".to_string(),
                    status: TransactionStatus::Pending,
                    provider: provider_name,
                    provider_transaction_id: Some(link_response.provider_transaction_id),
                    provider_payment_link: Some(link_response.payment_link_url.clone()),
                    receipt_number: None,
                    created_at: crate::time_util::now(),
                    completed_at: None,
                    failed_at: None,
                    refunded_at: None,
                    failure_reason: None,
                    provider_metadata: None,
                };

                let mut tx = self.pool.begin().await?;
                self.transactions.insert(&mut tx, &transaction).await?;
                self.appointments.set_payment_status(&mut tx, workspace.id, appointment_id, PaymentStatus::PaymentSent, None).await?;
                tx.commit().await?;

                if let Err(error) = self
                    .notifier
                    .send_payment_request_email(
                        customer_email,
                        &transaction.payment_method,
                        transaction.total_amount,
                        &transaction.currency,
                        &link_response.payment_link_url,
                    )
                    .await
                {
                    tracing::warn!(%error, transaction_id = %transaction.id, "payment request email failed, continuing");
                }

                Ok(transaction)
            }
            Err(error @ (Error::InvalidCredentials | Error::PaymentProviderError { .. } | Error::ProviderNotConfigured { .. })) => {
                let failed = PaymentTransaction {
                    id: PaymentTransactionId::new(),
                    workspace_id: workspace.id,
                    appointment_id: Some(appointment_id),
                    base_amount: rust_decimal::Decimal::ZERO,
                    vat_amount: rust_decimal::Decimal::ZERO,
                    total_amount: total,
                    currency: workspace.payment_config.currency.clone(),
                    payment_method: "online_card".to_string(),
                    status: TransactionStatus::Failed,
                    provider: provider_name,
                    provider_transaction_id: None,
                    provider_payment_link: None,
                    receipt_number: None,
                    created_at: crate::time_util::now(),
                    completed_at: None,
                    failed_at: Some(crate::time_util::now()),
                    refunded_at: None,
                    failure_reason: Some(error.to_string()),
                    provider_metadata: None,
                };

                let mut tx = self.pool.begin().await?;
                self.transactions.insert(&mut tx, &failed).await?;
                tx.commit().await?;

                Err(error)
            }
            Err(other) => Err(other),
        }
    }

    /// Verifies, parses, and applies a webhook. The HTTP layer always responds `200` regardless of what
    /// this returns; callers should log the error, not surface it.
    pub async fn process_webhook(&self, workspace: &Workspace, raw_body: &[u8], headers: &HashMap<String, String>) -> Result<PaymentTransaction> {
        let provider = get_payment_provider(workspace)?;

        let is_valid = provider.verify_webhook(raw_body, headers).await?;
        if !is_valid {
            return Err(Error::webhook_verification("webhook signature verification failed"));
        }

        let payload: serde_json::Value =
            serde_json::from_slice(raw_body).map_err(|error| Error::payment_provider(format!("malformed webhook payload: {error}")))?;
        let webhook_data = provider.parse_webhook_payment(&payload).await?;

        let idempotency_key = format!("webhook:{}", webhook_data.provider_transaction_id);
        let first_time = self.store.set_if_absent_ex(&idempotency_key, "1", WEBHOOK_IDEMPOTENCY_TTL_SECS).await?;

        let existing = self.transactions.find_by_provider_transaction_id(workspace.id, &webhook_data.provider_transaction_id).await?;
        let transaction = existing.ok_or(Error::TransactionNotFound)?;

        if !first_time {
            tracing::info!(provider_transaction_id = %webhook_data.provider_transaction_id, "webhook already processed, returning existing transaction");
            return Ok(transaction);
        }

        self.apply_webhook_transition(workspace.id, transaction.id, transaction.appointment_id, &webhook_data).await
    }

    async fn apply_webhook_transition(
        &self,
        workspace_id: WorkspaceId,
        transaction_id: PaymentTransactionId,
        appointment_id: Option<AppointmentId>,
        webhook_data: &WebhookPaymentData,
    ) -> Result<PaymentTransaction> {
        let now = crate::time_util::now();

        let (status, completed_at, failed_at, refunded_at, appointment_status) = match webhook_data.status {
            WebhookPaymentStatus::Completed => (TransactionStatus::Completed, Some(now), None, None, Some(PaymentStatus::Paid)),
            WebhookPaymentStatus::Failed => (TransactionStatus::Failed, None, Some(now), None, Some(PaymentStatus::NotPaid)),
            WebhookPaymentStatus::Refunded => (TransactionStatus::Refunded, None, None, Some(now), Some(PaymentStatus::NotPaid)),
            WebhookPaymentStatus::Pending => (TransactionStatus::Pending, None, None, None, None),
        };

        let completed_at = completed_at.or(webhook_data.completed_at);

        let mut tx = self.pool.begin().await?;
        let mut updated = self
            .transactions
            .apply_status_transition(
                &mut tx,
                workspace_id,
                transaction_id,
                status,
                completed_at,
                failed_at,
                refunded_at,
                webhook_data.failure_reason.clone(),
                webhook_data.metadata.clone(),
            )
            .await?;

        // Receipt numbers are allocated the moment a transaction first
        // reaches `completed`. The
        // `receipt_number IS NULL` guard in `set_receipt_number` keeps a
        // replayed completion from allocating twice.
        if updated.status == TransactionStatus::Completed && updated.receipt_number.is_none() {
            let receipt_number = self.workspaces.next_receipt_number(&mut tx, workspace_id).await?;
            self.transactions.set_receipt_number(&mut tx, workspace_id, updated.id, receipt_number).await?;
            updated.receipt_number = Some(receipt_number);
        }

        if let (Some(appointment_id), Some(appointment_status)) = (appointment_id, appointment_status) {
            let paid_at = matches!(appointment_status, PaymentStatus::Paid).then_some(now);
            self.appointments.set_payment_status(&mut tx, workspace_id, appointment_id, appointment_status, paid_at).await?;
        }

        tx.commit().await?;
        Ok(updated)
    }

    /// Manual mark-paid/mark-unpaid path: identical
    /// appointment-status propagation, no `PaymentTransaction` involved.
    pub async fn mark_paid(&self, workspace_id: WorkspaceId, appointment_id: AppointmentId, paid_at: Option<time::OffsetDateTime>) -> Result<()> {
        let paid_at = paid_at.unwrap_or_else(crate::time_util::now);
        let mut tx = self.pool.begin().await?;
        self.appointments.set_payment_status(&mut tx, workspace_id, appointment_id, PaymentStatus::Paid, Some(paid_at)).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn mark_unpaid(&self, workspace_id: WorkspaceId, appointment_id: AppointmentId) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        self.appointments.set_payment_status(&mut tx, workspace_id, appointment_id, PaymentStatus::NotPaid, None).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::vat::calculate_vat as vat_calc;
    use std::str::FromStr;

    #[test]
    fn vat_split_matches_transaction_invariant() {
        let total = rust_decimal::Decimal::from_str("234.00").unwrap();
        let rate = rust_decimal::Decimal::from_str("17.00").unwrap();
        let breakdown = vat_calc(total, rate, true).unwrap();
        assert_eq!(breakdown.base_amount + breakdown.vat_amount, breakdown.total_amount);
    }
}
