//! Crate-wide error type. Every component boundary named in the data flow
//! (persistence, encryption, vector store, RAG pipeline, payment provider,
//! rate limiter, circuit breaker) surfaces one of these variants; the HTTP
//! layer maps them to status codes via [`IntoResponse`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{resource_type} not found")]
    NotFound { resource_type: &'static str },

    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("unprocessable: {message}")]
    UnprocessableEntity { message: String },

    #[error("rate limited")]
    RateLimited,

    #[error("gone: {message}")]
    Gone { message: String },

    #[error("invalid provider credentials")]
    InvalidCredentials,

    #[error("payment provider {name} is not configured")]
    ProviderNotConfigured { name: String },

    #[error("payment provider error: {message}")]
    PaymentProviderError { message: String },

    #[error("webhook signature verification error: {message}")]
    WebhookVerificationError { message: String },

    #[error("transaction not found")]
    TransactionNotFound,

    #[error("circuit '{name}' is open")]
    CircuitOpen { name: String },

    #[error("retrieval failed: {message}")]
    RetrievalFailed { message: String },

    #[error("synthesis failed: {message}")]
    SynthesisFailed { message: String },

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("unknown encryption key version: {version}")]
    UnknownKeyVersion { version: String },

    #[error("invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: i32, actual: i32 },

    #[error("invalid amount: {message}")]
    InvalidAmount { message: String },

    #[error("session is already finalized")]
    AlreadyFinalized,

    #[error("session is already a draft")]
    AlreadyDraft,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(resource_type: &'static str) -> Self {
        Self::NotFound { resource_type }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict { message: message.into() }
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::UnprocessableEntity { message: message.into() }
    }

    pub fn gone(message: impl Into<String>) -> Self {
        Self::Gone { message: message.into() }
    }

    pub fn provider_not_configured(name: impl Into<String>) -> Self {
        Self::ProviderNotConfigured { name: name.into() }
    }

    pub fn payment_provider(message: impl Into<String>) -> Self {
        Self::PaymentProviderError { message: message.into() }
    }

    pub fn webhook_verification(message: impl Into<String>) -> Self {
        Self::WebhookVerificationError { message: message.into() }
    }

    pub fn circuit_open(name: impl Into<String>) -> Self {
        Self::CircuitOpen { name: name.into() }
    }

    pub fn retrieval_failed(message: impl Into<String>) -> Self {
        Self::RetrievalFailed { message: message.into() }
    }

    pub fn synthesis_failed(message: impl Into<String>) -> Self {
        Self::SynthesisFailed { message: message.into() }
    }

    pub fn unknown_key_version(version: impl Into<String>) -> Self {
        Self::UnknownKeyVersion { version: version.into() }
    }

    pub fn invalid_amount(message: impl Into<String>) -> Self {
        Self::InvalidAmount { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Status code. Kept separate from `IntoResponse` so
    /// non-HTTP callers (the purge worker) can branch on severity without
    /// pulling in axum response types.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::UnprocessableEntity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Gone { .. } => StatusCode::GONE,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::ProviderNotConfigured { .. } => StatusCode::BAD_REQUEST,
            Self::PaymentProviderError { .. } => StatusCode::BAD_REQUEST,
            Self::WebhookVerificationError { .. } => StatusCode::OK,
            Self::TransactionNotFound => StatusCode::OK,
            Self::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::RetrievalFailed { .. } | Self::SynthesisFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::EncryptionFailed | Self::DecryptionFailed => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UnknownKeyVersion { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidDimension { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::VersionConflict { .. } => StatusCode::CONFLICT,
            Self::InvalidAmount { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::AlreadyFinalized | Self::AlreadyDraft => StatusCode::CONFLICT,
            Self::Database(_) | Self::Serialization(_) | Self::Cache(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Encryption/codec failures never expose detail.
        let body = match &self {
            Self::EncryptionFailed | Self::DecryptionFailed | Self::UnknownKeyVersion { .. } => {
                json!({ "detail": "internal error" })
            }
            Self::Database(_) | Self::Serialization(_) | Self::Cache(_) | Self::Internal(_) => {
                json!({ "detail": "internal error" })
            }
            Self::RetrievalFailed { .. } | Self::SynthesisFailed { .. } => {
                json!({ "detail": "internal error" })
            }
            Self::Conflict { message } | Self::UnprocessableEntity { message } | Self::Gone { message } => {
                json!({ "message": message })
            }
            other => json!({ "detail": other.to_string() }),
        };

        if matches!(status, StatusCode::INTERNAL_SERVER_ERROR) {
            tracing::error!(error = %self, "request failed with internal error");
        }

        (status, Json(body)).into_response()
    }
}
