//! API key model for administrative authentication.
//!
//! API keys authenticate the dashboard/API layer calling the administrative
//! endpoints. They are stored in the database as SHA-256 hashes.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Represents an API key record from the database.
///
/// When a request comes in with `Bearer abc123`, the middleware hashes
/// the token with SHA-256 and looks the digest up here. Inactive keys are
/// rejected, which revokes access without deleting the record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    pub id: Uuid,

    /// SHA-256 hash of the actual API key (64 hex characters)
    pub key_hash: String,

    /// Human-readable name of the business using this API key
    pub business_name: String,

    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}
