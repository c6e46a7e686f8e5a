//! Error types and HTTP error response handling.
//!
//! One `AppError` enum covers the whole engine. Each variant maps to a
//! specific HTTP status code and JSON body.
//!
//! # Taxonomy
//!
//! - **Authentication**: bad webhook signature / API key — rejected
//!   immediately, never retried internally
//! - **Not found**: unknown account, beneficiary, transaction, settlement
//! - **Configuration**: missing gateway credentials or bank details — parks
//!   the affected sweep instead of aborting everything
//! - **Gateway**: transient network/timeout failures talking to the bank —
//!   the batch is marked failed and retried on the next sweep
//! - **Invariant violation**: a commission split that does not sum, a balance
//!   mismatch — fatal for the single transaction, which is quarantined for
//!   manual review rather than silently coerced
//!
//! Idempotent webhook replays are not errors: they short-circuit to success.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// API key is missing, invalid, or inactive. HTTP 401.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Webhook signature is missing, malformed, or does not verify — or the
    /// shared secret is not configured on our side. HTTP 401; the gateway
    /// will retry.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Requested virtual account does not exist. HTTP 404.
    #[error("Account not found")]
    AccountNotFound,

    /// Requested beneficiary does not exist. HTTP 404.
    #[error("Beneficiary not found")]
    BeneficiaryNotFound,

    /// Requested ledger transaction does not exist. HTTP 404.
    #[error("Transaction not found")]
    TransactionNotFound,

    /// Requested settlement batch does not exist. HTTP 404.
    #[error("Settlement not found")]
    SettlementNotFound,

    /// Request body or parameters are invalid. HTTP 400.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// Financial correctness check failed for the data under processing.
    /// HTTP 422; the offending payload is quarantined, never coerced.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Required configuration is absent (gateway credentials, webhook
    /// secret). HTTP 503 when surfaced directly.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transient failure talking to the bank gateway. HTTP 502 when surfaced
    /// directly; on the sweep path it lands the batch in `failed` for retry.
    #[error("Gateway error: {0}")]
    Gateway(String),
}

/// True when a sqlx error is a Postgres unique-constraint violation. Used to
/// map concurrent duplicate webhook inserts onto the idempotent success path.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                self.to_string(),
            ),
            AppError::InvalidSignature => (
                StatusCode::UNAUTHORIZED,
                "invalid_signature",
                self.to_string(),
            ),
            AppError::AccountNotFound => {
                (StatusCode::NOT_FOUND, "account_not_found", self.to_string())
            }
            AppError::BeneficiaryNotFound => (
                StatusCode::NOT_FOUND,
                "beneficiary_not_found",
                self.to_string(),
            ),
            AppError::TransactionNotFound => (
                StatusCode::NOT_FOUND,
                "transaction_not_found",
                self.to_string(),
            ),
            AppError::SettlementNotFound => (
                StatusCode::NOT_FOUND,
                "settlement_not_found",
                self.to_string(),
            ),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::InvariantViolation(ref msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invariant_violation",
                msg.clone(),
            ),
            AppError::Configuration(ref msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "configuration_error",
                msg.clone(),
            ),
            AppError::Gateway(ref msg) => (StatusCode::BAD_GATEWAY, "gateway_error", msg.clone()),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred".to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
