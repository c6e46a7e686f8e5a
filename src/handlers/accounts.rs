//! Virtual account HTTP handlers.
//!
//! Administrative endpoints consumed by the dashboard/API layer:
//! - `POST /api/v1/accounts` - idempotent get-or-create
//! - `GET /api/v1/accounts/{id}` - fetch one account
//! - `POST /api/v1/accounts/{id}/close` - soft-delete (requires zero balance)

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
    models::account::{AccountResponse, CreateAccountRequest},
    services::ledger,
    state::AppState,
};

/// Get or create a virtual account for a customer.
///
/// # Endpoint
///
/// `POST /api/v1/accounts`
///
/// Idempotent: if an account already exists for the customer+kind pair, it
/// is returned unchanged and the rates in the request are ignored.
pub async fn get_or_create_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    let account = ledger::get_or_create_account(&state.pool, &request).await?;

    tracing::info!(
        account = %account.account_number,
        customer = %account.customer_id,
        by = %auth.business_name,
        "virtual account resolved"
    );

    Ok((StatusCode::OK, Json(AccountResponse::from(account))))
}

/// Fetch a virtual account by ID.
///
/// # Endpoint
///
/// `GET /api/v1/accounts/{id}`
pub async fn get_account(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<AccountResponse>, AppError> {
    let account = ledger::find_account(&state.pool, account_id).await?;
    Ok(Json(account.into()))
}

/// Close a virtual account.
///
/// # Endpoint
///
/// `POST /api/v1/accounts/{id}/close`
///
/// Rejected with 400 while the balance is non-zero. Closing an already
/// closed account is a no-op.
pub async fn close_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<AccountResponse>, AppError> {
    let account = ledger::close_account(&state.pool, account_id).await?;

    tracing::info!(
        account = %account.account_number,
        by = %auth.business_name,
        "virtual account closed"
    );

    Ok(Json(account.into()))
}
