//! Settlement HTTP handlers.
//!
//! - `POST /api/v1/settlements/sweep/{beneficiary_id}` - manual sweep
//! - `GET /api/v1/settlements/summary?from=&to=` - per-status aggregates
//! - `GET /api/v1/settlements/{reference}` - one batch by reference

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::settlement::{SettlementBatchResponse, SettlementSummaryRow},
    services::settlement::{self, SweepOutcome},
    state::AppState,
};

/// Result of a manual sweep, flattened for the dashboard.
#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<SettlementBatchResponse>,
}

/// Trigger a settlement sweep for one beneficiary.
///
/// # Endpoint
///
/// `POST /api/v1/settlements/sweep/{beneficiary_id}`
///
/// Runs the sweep inline (unlike the webhook-triggered path, the admin
/// caller wants the outcome). A beneficiary without bank details or an
/// unconfigured gateway parks the batch rather than failing the call; a
/// gateway failure returns the failed batch, eligible for retry.
pub async fn manual_sweep(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(beneficiary_id): Path<Uuid>,
) -> Result<Json<SweepResponse>, AppError> {
    tracing::info!(%beneficiary_id, by = %auth.business_name, "manual sweep requested");

    let outcome =
        settlement::sweep_beneficiary(&state.pool, &state.config, beneficiary_id).await?;

    let response = match outcome {
        SweepOutcome::NothingEligible => SweepResponse {
            outcome: "nothing_eligible",
            batch: None,
        },
        SweepOutcome::Parked(batch) => SweepResponse {
            outcome: "parked",
            batch: Some(batch.into()),
        },
        SweepOutcome::Settled(batch) => SweepResponse {
            outcome: "settled",
            batch: Some(batch.into()),
        },
        SweepOutcome::Failed(batch) => SweepResponse {
            outcome: "failed",
            batch: Some(batch.into()),
        },
    };

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Settlement summary over a date range, aggregated per batch status.
///
/// # Endpoint
///
/// `GET /api/v1/settlements/summary?from=&to=`
pub async fn settlement_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<Vec<SettlementSummaryRow>>, AppError> {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from >= to {
            return Err(AppError::InvalidRequest(
                "`from` must be earlier than `to`".to_string(),
            ));
        }
    }

    let rows = settlement::settlement_summary(&state.pool, query.from, query.to).await?;
    Ok(Json(rows))
}

/// Fetch a settlement batch by its reference.
///
/// # Endpoint
///
/// `GET /api/v1/settlements/{reference}`
pub async fn get_settlement(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<SettlementBatchResponse>, AppError> {
    let batch = settlement::find_batch_by_reference(&state.pool, &reference)
        .await?
        .ok_or(AppError::SettlementNotFound)?;

    Ok(Json(batch.into()))
}
