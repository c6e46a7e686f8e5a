//! Inbound gateway webhook handlers.
//!
//! These are the two public routes the external gateways call:
//! - `POST /webhooks/payments` - payment notification from the payment
//!   gateway, authenticated with an HMAC-SHA512 signature header
//! - `POST /webhooks/settlements` - settlement status notification from the
//!   bank gateway
//!
//! Neither route passes through the API-key middleware.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::webhook::{PaymentNotification, SettlementStatusNotification, WebhookAck},
    services::{settlement, webhook_processor, webhook_processor::ProcessOutcome},
    state::AppState,
    worker::SweepRequest,
};

/// Header carrying the gateway's hex-encoded HMAC-SHA512 signature.
const SIGNATURE_HEADER: &str = "x-payment-signature";

/// Receive a payment notification from the payment gateway.
///
/// # Endpoint
///
/// `POST /webhooks/payments`
///
/// # Acknowledgement contract
///
/// `200 {"status": "ok"}` tells the gateway the outcome is durably committed
/// and the delivery must not be retried. That covers the booked, duplicate,
/// and quarantined outcomes alike. A bad signature gets 401 and the gateway
/// retries; so does a database failure (500).
///
/// A threshold-crossing credit enqueues a settlement sweep on the worker
/// channel before responding; the response never waits on the bank gateway.
pub async fn receive_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(notification): Json<PaymentNotification>,
) -> Result<Json<WebhookAck>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;

    let outcome = webhook_processor::process_payment_notification(
        &state.pool,
        &state.config,
        &notification,
        signature,
    )
    .await?;

    let ack = match outcome {
        ProcessOutcome::Booked {
            account,
            transaction,
            sweep_beneficiary,
        } => {
            tracing::debug!(
                reference = %transaction.transaction_reference,
                account = %account.account_number,
                "payment webhook acknowledged"
            );
            if let Some(beneficiary_id) = sweep_beneficiary {
                // Fire-and-forget: a full queue is logged and dropped; the
                // next trigger or the daily sweep covers it.
                if let Err(err) = state.sweep_tx.try_send(SweepRequest { beneficiary_id }) {
                    tracing::warn!(%beneficiary_id, "sweep queue full, trigger dropped: {err}");
                }
            }
            WebhookAck::ok()
        }
        ProcessOutcome::Duplicate { transaction } => {
            tracing::debug!(
                reference = %transaction.transaction_reference,
                "duplicate payment webhook acknowledged"
            );
            WebhookAck::ok_with_detail("duplicate")
        }
        ProcessOutcome::Quarantined { reason } => {
            WebhookAck::ok_with_detail(format!("unprocessable: {reason}"))
        }
    };

    Ok(Json(ack))
}

/// Receive a settlement status notification from the bank gateway.
///
/// # Endpoint
///
/// `POST /webhooks/settlements`
///
/// Flips the matching batch from `submitted` to `success`/`failed` and
/// updates its linked transactions, idempotently per batch reference. An
/// unknown reference is 404 so the bank's retry can land after our batch
/// insert commits.
pub async fn receive_settlement_status(
    State(state): State<AppState>,
    Json(notification): Json<SettlementStatusNotification>,
) -> Result<impl IntoResponse, AppError> {
    let batch = settlement::apply_status_notification(&state.pool, &notification).await?;

    tracing::info!(
        batch = %batch.batch_reference,
        status = %batch.status,
        "settlement status webhook applied"
    );

    Ok((StatusCode::OK, Json(WebhookAck::ok())))
}
