//! Beneficiary and settlement batch data models.
//!
//! A beneficiary is the insurance company ultimately owed settled premium
//! funds. A settlement batch groups the eligible transactions of one
//! beneficiary during one sweep and tracks the bulk transfer to completion.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Batch status values (stored as text).
///
/// - `pending`: created but not executable (missing bank details or gateway
///   configuration); waits for manual follow-up
/// - `submitted`: handed to the bank gateway, awaiting acknowledgement
/// - `success` / `failed`: terminal
pub mod batch_status {
    pub const PENDING: &str = "pending";
    pub const SUBMITTED: &str = "submitted";
    pub const SUCCESS: &str = "success";
    pub const FAILED: &str = "failed";
}

/// Represents a beneficiary record from the database.
///
/// Settlement bank details are optional: a beneficiary without them parks
/// its sweeps in a pending, non-executing batch rather than failing them.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Beneficiary {
    pub id: Uuid,
    pub name: String,

    /// Vendor code the bank gateway knows this beneficiary by
    pub vendor_code: String,

    pub bank_code: Option<String>,
    pub bank_account_number: Option<String>,
    pub bank_account_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Beneficiary {
    pub fn has_bank_details(&self) -> bool {
        self.bank_code.is_some() && self.bank_account_number.is_some()
    }
}

/// Request body for registering a beneficiary.
#[derive(Debug, Deserialize)]
pub struct CreateBeneficiaryRequest {
    pub name: String,
    pub vendor_code: String,
    pub bank_code: Option<String>,
    pub bank_account_number: Option<String>,
    pub bank_account_name: Option<String>,
}

/// Represents a settlement batch record from the database.
///
/// `gross_amount == commission_withheld + net_amount` for every batch.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct SettlementBatch {
    pub id: Uuid,
    pub beneficiary_id: Uuid,

    /// Our reference, quoted back by the bank's status webhook
    pub batch_reference: String,

    /// The bank gateway's own reference, once acknowledged
    pub gateway_reference: Option<String>,

    /// Sum of the contributing transactions' settled amounts
    pub gross_amount: Decimal,

    /// Sum of the platform commissions already recorded on those transactions
    pub commission_withheld: Decimal,

    /// Amount actually transferred to the beneficiary
    pub net_amount: Decimal,

    /// pending | submitted | success | failed
    pub status: String,

    pub failure_reason: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SettlementBatch {
    pub fn is_terminal(&self) -> bool {
        self.status == batch_status::SUCCESS || self.status == batch_status::FAILED
    }
}

/// Response body for settlement endpoints.
#[derive(Debug, Serialize)]
pub struct SettlementBatchResponse {
    pub id: Uuid,
    pub beneficiary_id: Uuid,
    pub batch_reference: String,
    pub gateway_reference: Option<String>,
    pub gross_amount: Decimal,
    pub commission_withheld: Decimal,
    pub net_amount: Decimal,
    pub status: String,
    pub failure_reason: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<SettlementBatch> for SettlementBatchResponse {
    fn from(b: SettlementBatch) -> Self {
        Self {
            id: b.id,
            beneficiary_id: b.beneficiary_id,
            batch_reference: b.batch_reference,
            gateway_reference: b.gateway_reference,
            gross_amount: b.gross_amount,
            commission_withheld: b.commission_withheld,
            net_amount: b.net_amount,
            status: b.status,
            failure_reason: b.failure_reason,
            submitted_at: b.submitted_at,
            completed_at: b.completed_at,
            created_at: b.created_at,
        }
    }
}

/// One row of the settlement summary, aggregated per batch status over a
/// date range.
#[derive(Debug, sqlx::FromRow, Serialize)]
pub struct SettlementSummaryRow {
    pub status: String,
    pub batch_count: i64,
    pub gross_amount: Decimal,
    pub commission_withheld: Decimal,
    pub net_amount: Decimal,
}
