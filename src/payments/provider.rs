//! Payment provider abstraction.
//!
//! `{create_payment_link, verify_webhook, parse_webhook_payment}`, resolved
//! from `workspace.payment_provider` by a factory function rather than by
//! direct construction.

use async_trait::async_trait;
use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::payments::providers::payplus::PayPlusProvider;
use crate::workspace::Workspace;

#[derive(Debug, Clone)]
pub struct PaymentLinkRequest {
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub customer_email: String,
    pub customer_name: Option<String>,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct PaymentLinkResponse {
    pub payment_link_url: String,
    pub provider_transaction_id: String,
    pub expires_at: Option<OffsetDateTime>,
}

/// Normalized webhook payload, common to every provider.
#[derive(Debug, Clone)]
pub struct WebhookPaymentData {
    pub provider_transaction_id: String,
    pub status: WebhookPaymentStatus,
    pub amount: Decimal,
    pub currency: String,
    pub completed_at: Option<OffsetDateTime>,
    pub failure_reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookPaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_payment_link(&self, request: &PaymentLinkRequest) -> Result<PaymentLinkResponse>;

    /// Returns `false` for a structurally valid but cryptographically
    /// invalid signature; fails `WebhookVerificationError` only when the
    /// signature header itself is missing or malformed.
    async fn verify_webhook(&self, raw_body: &[u8], headers: &std::collections::HashMap<String, String>) -> Result<bool>;

    async fn parse_webhook_payment(&self, payload: &serde_json::Value) -> Result<WebhookPaymentData>;
}

/// Resolves `workspace.payment_config` to a concrete provider instance.
/// Unknown provider names fail `ProviderNotConfigured`.
pub fn get_payment_provider(workspace: &Workspace) -> Result<Box<dyn PaymentProvider>> {
    let name = workspace.payment_config.provider.as_deref().ok_or_else(|| Error::provider_not_configured("none"))?;

    match name {
        "payplus" => Ok(Box::new(PayPlusProvider::from_config(&workspace.payment_config.provider_config)?)),
        other => Err(Error::provider_not_configured(other)),
    }
}
