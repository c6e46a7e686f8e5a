//! Ledger transaction data models.
//!
//! This module defines:
//! - `VaTransaction`: Database entity, one row per ingested notification
//! - `NewLedgerEntry`: The values the ledger store persists atomically
//! - `TransactionResponse`: Response body returned to API clients
//!
//! # Immutability
//!
//! A transaction row is immutable once written except for status transitions
//! (`pending -> completed | failed`, `completed -> reversed`), the settlement
//! batch linkage, and the compliance freeze flag.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ledger entry type, stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Inbound payment booked from a gateway webhook
    Credit,
    /// Generic outflow
    Debit,
    /// Commission withheld at settlement time
    Commission,
    /// Net transfer to a beneficiary at settlement time
    Settlement,
    /// Reversal of a previously completed credit
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "credit",
            TransactionType::Debit => "debit",
            TransactionType::Commission => "commission",
            TransactionType::Settlement => "settlement",
            TransactionType::Refund => "refund",
        }
    }

    /// Whether this entry increases the account balance. Everything that is
    /// not a credit (debit, commission, settlement, refund) is an outflow.
    pub fn is_credit(&self) -> bool {
        matches!(self, TransactionType::Credit)
    }
}

/// Transaction status values (stored as text).
pub mod tx_status {
    pub const PENDING: &str = "pending";
    pub const COMPLETED: &str = "completed";
    pub const FAILED: &str = "failed";
    pub const REVERSED: &str = "reversed";
}

/// Represents a ledger transaction record from the database.
///
/// # Idempotency
///
/// `transaction_reference` carries a UNIQUE constraint: the same gateway
/// notification can never be applied to the ledger twice, no matter how many
/// times it is delivered.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct VaTransaction {
    pub id: Uuid,

    /// Owning virtual account
    pub account_id: Uuid,

    /// Globally unique gateway reference (the idempotency key)
    pub transaction_reference: String,

    /// credit | debit | commission | settlement | refund
    pub transaction_type: String,

    /// pending | completed | failed | reversed
    pub status: String,

    /// Amount the payer remitted
    pub principal_amount: Decimal,

    /// Amount actually settled after the gateway's own fee
    pub settled_amount: Decimal,

    /// Fee the payment gateway charged
    pub fee_charged: Decimal,

    /// Total commission withheld (platform)
    pub platform_commission: Decimal,

    /// Primary operator's share of the platform commission
    pub primary_commission: Decimal,

    /// Partner's share of the platform commission
    pub partner_commission: Decimal,

    pub currency: String,
    pub sender_name: Option<String>,
    pub remarks: Option<String>,

    /// When the payer's transaction happened (gateway clock)
    pub transacted_at: DateTime<Utc>,

    /// When the webhook reached us
    pub received_at: DateTime<Utc>,

    /// Set while a settlement batch holds this transaction. A link to a
    /// successful batch is permanent and excludes the row from future sweeps.
    pub settlement_batch_id: Option<Uuid>,

    /// Compliance hold: frozen transactions are never settlement-eligible
    pub frozen: bool,
    pub frozen_reason: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl VaTransaction {
    pub fn is_completed(&self) -> bool {
        self.status == tx_status::COMPLETED
    }
}

/// Values persisted by the ledger store in one atomic step.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub transaction_reference: String,
    pub transaction_type: TransactionType,
    pub principal_amount: Decimal,
    pub settled_amount: Decimal,
    pub fee_charged: Decimal,
    pub platform_commission: Decimal,
    pub primary_commission: Decimal,
    pub partner_commission: Decimal,
    pub currency: String,
    pub sender_name: Option<String>,
    pub remarks: Option<String>,
    pub transacted_at: DateTime<Utc>,
    pub settlement_batch_id: Option<Uuid>,
}

impl NewLedgerEntry {
    /// The (credit, debit) totals deltas this entry applies to its account.
    pub fn deltas(&self) -> (Decimal, Decimal) {
        if self.transaction_type.is_credit() {
            (self.settled_amount, Decimal::ZERO)
        } else {
            (Decimal::ZERO, self.settled_amount)
        }
    }
}

/// Request body for placing a compliance hold on a transaction.
#[derive(Debug, Deserialize)]
pub struct FreezeRequest {
    pub reason: String,
}

/// Response returned for transaction reads.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub account_id: Uuid,
    pub transaction_reference: String,
    pub transaction_type: String,
    pub status: String,
    pub principal_amount: Decimal,
    pub settled_amount: Decimal,
    pub fee_charged: Decimal,
    pub platform_commission: Decimal,
    pub primary_commission: Decimal,
    pub partner_commission: Decimal,
    pub currency: String,
    pub sender_name: Option<String>,
    pub remarks: Option<String>,
    pub transacted_at: DateTime<Utc>,
    pub settlement_batch_id: Option<Uuid>,
    pub frozen: bool,
}

impl From<VaTransaction> for TransactionResponse {
    fn from(t: VaTransaction) -> Self {
        Self {
            id: t.id,
            account_id: t.account_id,
            transaction_reference: t.transaction_reference,
            transaction_type: t.transaction_type,
            status: t.status,
            principal_amount: t.principal_amount,
            settled_amount: t.settled_amount,
            fee_charged: t.fee_charged,
            platform_commission: t.platform_commission,
            primary_commission: t.primary_commission,
            partner_commission: t.partner_commission,
            currency: t.currency,
            sender_name: t.sender_name,
            remarks: t.remarks,
            transacted_at: t.transacted_at,
            settlement_batch_id: t.settlement_batch_id,
            frozen: t.frozen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(transaction_type: TransactionType) -> NewLedgerEntry {
        NewLedgerEntry {
            transaction_reference: "REF-1".to_string(),
            transaction_type,
            principal_amount: dec!(100.00),
            settled_amount: dec!(99.50),
            fee_charged: dec!(0.50),
            platform_commission: Decimal::ZERO,
            primary_commission: Decimal::ZERO,
            partner_commission: Decimal::ZERO,
            currency: "NGN".to_string(),
            sender_name: None,
            remarks: None,
            transacted_at: Utc::now(),
            settlement_batch_id: None,
        }
    }

    #[test]
    fn credit_entries_increase_the_credit_total_only() {
        let (credit, debit) = entry(TransactionType::Credit).deltas();
        assert_eq!(credit, dec!(99.50));
        assert_eq!(debit, Decimal::ZERO);
    }

    #[test]
    fn settlement_commission_and_refund_entries_are_debits() {
        for tx_type in [
            TransactionType::Debit,
            TransactionType::Commission,
            TransactionType::Settlement,
            TransactionType::Refund,
        ] {
            let (credit, debit) = entry(tx_type).deltas();
            assert_eq!(credit, Decimal::ZERO);
            assert_eq!(debit, dec!(99.50));
        }
    }
}
