//! API key authentication middleware.
//!
//! The administrative endpoints (manual settlement, summaries, account and
//! beneficiary management) are called by the dashboard/API layer and require
//! an API key. The gateway-facing webhook routes do NOT pass through here:
//! they authenticate with their own HMAC signatures.
//!
//! # Flow
//!
//! 1. Extract `Authorization: Bearer <key>` from the request
//! 2. Hash the key with SHA-256
//! 3. Look the hash up in `api_keys` where `is_active = true`
//! 4. Inject an [`AuthContext`] extension, or reject with HTTP 401

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{error::AppError, models::api_key::ApiKey, state::AppState};

/// Authentication context attached to authenticated requests.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// ID of the authenticated API key
    pub api_key_id: Uuid,

    /// Name of the business making the request
    pub business_name: String,
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidApiKey)?;

    let api_key = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::InvalidApiKey)?;

    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    let key_hash = hex::encode(hasher.finalize());

    let api_key_record = sqlx::query_as::<_, ApiKey>(
        "SELECT id, key_hash, business_name, created_at, is_active
         FROM api_keys
         WHERE key_hash = $1 AND is_active = true",
    )
    .bind(&key_hash)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::InvalidApiKey)?;

    let auth = AuthContext {
        api_key_id: api_key_record.id,
        business_name: api_key_record.business_name,
    };
    tracing::debug!(api_key_id = %auth.api_key_id, business = %auth.business_name, "request authenticated");
    request.extensions_mut().insert(auth);

    Ok(next.run(request).await)
}
