//! Ledger transaction HTTP handlers.
//!
//! - `GET /api/v1/transactions/unsettled` - settlement-eligible credits,
//!   optionally filtered by beneficiary
//! - `POST /api/v1/transactions/{id}/freeze` - compliance hold
//! - `POST /api/v1/transactions/{id}/reverse` - reverse a completed credit

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::transaction::{FreezeRequest, TransactionResponse},
    services::ledger,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct UnsettledQuery {
    pub beneficiary_id: Option<Uuid>,
}

/// List completed, unfrozen, unsettled credit transactions, oldest first.
///
/// # Endpoint
///
/// `GET /api/v1/transactions/unsettled?beneficiary_id=`
///
/// This is the same eligibility view the settlement orchestrator sweeps
/// from, exposed for reconciliation dashboards.
pub async fn list_unsettled(
    State(state): State<AppState>,
    Query(query): Query<UnsettledQuery>,
) -> Result<Json<Vec<TransactionResponse>>, AppError> {
    let transactions =
        ledger::list_settlement_eligible(&state.pool, query.beneficiary_id).await?;

    Ok(Json(transactions.into_iter().map(Into::into).collect()))
}

/// Place a compliance hold on a transaction.
///
/// # Endpoint
///
/// `POST /api/v1/transactions/{id}/freeze`
///
/// Frozen transactions are excluded from settlement eligibility until the
/// hold is lifted. Transactions already linked to a batch cannot be frozen.
pub async fn freeze_transaction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(transaction_id): Path<Uuid>,
    Json(request): Json<FreezeRequest>,
) -> Result<Json<TransactionResponse>, AppError> {
    if request.reason.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "a freeze reason is required".to_string(),
        ));
    }

    let transaction =
        ledger::freeze_transaction(&state.pool, transaction_id, &request.reason).await?;

    tracing::warn!(
        reference = %transaction.transaction_reference,
        reason = %request.reason,
        by = %auth.business_name,
        "transaction frozen"
    );

    Ok(Json(transaction.into()))
}

/// Response for a reversal: the reversed original plus the offsetting
/// refund entry booked in the same atomic scope.
#[derive(Debug, Serialize)]
pub struct ReversalResponse {
    pub reversed: TransactionResponse,
    pub refund: TransactionResponse,
}

/// Reverse a completed, unsettled credit.
///
/// # Endpoint
///
/// `POST /api/v1/transactions/{id}/reverse`
pub async fn reverse_transaction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<ReversalResponse>, AppError> {
    let (reversed, refund) = ledger::reverse_transaction(&state.pool, transaction_id).await?;

    tracing::warn!(
        reference = %reversed.transaction_reference,
        by = %auth.business_name,
        "transaction reversed"
    );

    Ok(Json(ReversalResponse {
        reversed: reversed.into(),
        refund: refund.into(),
    }))
}
