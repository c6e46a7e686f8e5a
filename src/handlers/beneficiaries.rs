//! Beneficiary HTTP handlers.
//!
//! Beneficiaries are the insurance companies settled funds flow to:
//! - `POST /api/v1/beneficiaries` - register a beneficiary
//! - `GET /api/v1/beneficiaries/{id}` - fetch one beneficiary

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::settlement::{Beneficiary, CreateBeneficiaryRequest},
    services::settlement,
    state::AppState,
};

/// Register a beneficiary.
///
/// # Endpoint
///
/// `POST /api/v1/beneficiaries`
///
/// Bank details are optional at registration: a beneficiary without them can
/// receive credits but its sweeps park in a pending, non-executing batch
/// until the details are filled in.
pub async fn create_beneficiary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateBeneficiaryRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.name.trim().is_empty() || request.vendor_code.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "name and vendor_code are required".to_string(),
        ));
    }

    let beneficiary = sqlx::query_as::<_, Beneficiary>(
        r#"
        INSERT INTO beneficiaries (name, vendor_code, bank_code, bank_account_number, bank_account_name)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(&request.name)
    .bind(&request.vendor_code)
    .bind(&request.bank_code)
    .bind(&request.bank_account_number)
    .bind(&request.bank_account_name)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(
        beneficiary = %beneficiary.name,
        vendor_code = %beneficiary.vendor_code,
        by = %auth.business_name,
        "beneficiary registered"
    );

    Ok((StatusCode::CREATED, Json(beneficiary)))
}

/// Fetch a beneficiary by ID.
///
/// # Endpoint
///
/// `GET /api/v1/beneficiaries/{id}`
pub async fn get_beneficiary(
    State(state): State<AppState>,
    Path(beneficiary_id): Path<Uuid>,
) -> Result<Json<Beneficiary>, AppError> {
    let beneficiary = settlement::find_beneficiary(&state.pool, beneficiary_id)
        .await?
        .ok_or(AppError::BeneficiaryNotFound)?;

    Ok(Json(beneficiary))
}
