//! Virtual account data models and API request/response types.
//!
//! This module defines:
//! - `VirtualAccount`: Database entity representing a customer's prepaid account
//! - `CommissionRates`: The three-way rate configuration applied to credits
//! - `CreateAccountRequest` / `AccountResponse`: API types
//!
//! # Balance Storage
//!
//! All money fields are `rust_decimal::Decimal` mapped to NUMERIC(18,2)
//! columns. The current balance is an identity over the cumulative totals
//! (`current_balance == total_credits - total_debits`), enforced by a CHECK
//! constraint; it is never written independently of the totals.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account kind, stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Individual,
    Business,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Individual => "individual",
            AccountKind::Business => "business",
        }
    }
}

/// Account lifecycle status values (stored as text).
///
/// - `active`: accepts credits and participates in settlement
/// - `inactive` / `suspended`: still books financially real credits
/// - `closed`: terminal, requires a zero balance to enter
pub mod account_status {
    pub const ACTIVE: &str = "active";
    pub const INACTIVE: &str = "inactive";
    pub const SUSPENDED: &str = "suspended";
    pub const CLOSED: &str = "closed";
}

/// Three-way commission rate configuration.
///
/// Rates are fractions of the settled amount (e.g. `0.01` for 1%). The
/// platform rate is the total withheld; the primary-operator and partner
/// rates divide it: `primary + partner == platform` within a 0.01 tolerance,
/// validated when an account is created, not at webhook time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommissionRates {
    pub platform: Decimal,
    pub primary: Decimal,
    pub partner: Decimal,
}

impl CommissionRates {
    /// Config-time validation of the rate triple.
    pub fn validate(&self) -> Result<(), String> {
        let tolerance = Decimal::new(1, 2); // 0.01
        if self.platform.is_sign_negative()
            || self.primary.is_sign_negative()
            || self.partner.is_sign_negative()
        {
            return Err("commission rates must not be negative".to_string());
        }
        if self.platform >= Decimal::ONE {
            return Err("platform rate must be below 1.0".to_string());
        }
        let gap = (self.primary + self.partner - self.platform).abs();
        if gap >= tolerance {
            return Err(format!(
                "primary ({}) + partner ({}) must equal platform ({})",
                self.primary, self.partner, self.platform
            ));
        }
        Ok(())
    }
}

/// Represents a virtual account record from the database.
///
/// # Database Table
///
/// Maps to the `virtual_accounts` table. One account per customer+kind
/// (unique constraint); created idempotently on first request.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct VirtualAccount {
    /// Unique identifier for this account
    pub id: Uuid,

    /// Owning customer
    pub customer_id: Uuid,

    /// Insurance company whose premiums flow into this account.
    ///
    /// Settlement sweeps group eligible transactions by this beneficiary.
    /// Accounts without one never trigger automatic sweeps.
    pub beneficiary_id: Option<Uuid>,

    /// Gateway-style account number, e.g. `VA-0482915573`
    pub account_number: String,

    /// "individual" or "business"
    pub kind: String,

    /// Lifecycle status (see [`account_status`])
    pub status: String,

    /// Cumulative credits applied to this account
    pub total_credits: Decimal,

    /// Cumulative debits applied to this account
    pub total_debits: Decimal,

    /// Always `total_credits - total_debits`
    pub current_balance: Decimal,

    /// Total commission rate withheld from each credit
    pub platform_rate: Decimal,

    /// Primary operator's share of the platform rate
    pub primary_rate: Decimal,

    /// Revenue-share partner's share of the platform rate
    pub partner_rate: Decimal,

    /// Whether crossing the threshold enqueues a settlement sweep
    pub auto_settlement: bool,

    /// Balance at which an automatic sweep fires
    pub settlement_threshold: Decimal,

    /// Timestamp of the last transaction applied to this account
    pub last_activity_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VirtualAccount {
    pub fn rates(&self) -> CommissionRates {
        CommissionRates {
            platform: self.platform_rate,
            primary: self.primary_rate,
            partner: self.partner_rate,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status == account_status::CLOSED
    }

    /// Settlement trigger decision (webhook processor step 6).
    ///
    /// Fires when auto-settlement is enabled, the refreshed balance has
    /// reached the threshold, and the account has a beneficiary to sweep to.
    pub fn should_trigger_sweep(&self) -> bool {
        self.auto_settlement
            && self.beneficiary_id.is_some()
            && self.current_balance >= self.settlement_threshold
    }
}

/// Request body for the idempotent get-or-create account endpoint.
///
/// # JSON Example
///
/// ```json
/// {
///   "customer_id": "550e8400-e29b-41d4-a716-446655440000",
///   "kind": "individual",
///   "platform_rate": "0.01",
///   "primary_rate": "0.0075",
///   "partner_rate": "0.0025",
///   "auto_settlement": true,
///   "settlement_threshold": "1000.00",
///   "beneficiary_id": "660e8400-e29b-41d4-a716-446655440001"
/// }
/// ```
///
/// If an account already exists for the customer+kind pair, it is returned
/// unchanged and the rates in the request are ignored.
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub customer_id: Uuid,
    pub kind: AccountKind,
    pub platform_rate: Decimal,
    pub primary_rate: Decimal,
    pub partner_rate: Decimal,
    #[serde(default)]
    pub auto_settlement: bool,
    #[serde(default)]
    pub settlement_threshold: Decimal,
    pub beneficiary_id: Option<Uuid>,
}

impl CreateAccountRequest {
    pub fn rates(&self) -> CommissionRates {
        CommissionRates {
            platform: self.platform_rate,
            primary: self.primary_rate,
            partner: self.partner_rate,
        }
    }
}

/// Response body for account endpoints.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub beneficiary_id: Option<Uuid>,
    pub account_number: String,
    pub kind: String,
    pub status: String,
    pub total_credits: Decimal,
    pub total_debits: Decimal,
    pub current_balance: Decimal,
    pub auto_settlement: bool,
    pub settlement_threshold: Decimal,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<VirtualAccount> for AccountResponse {
    fn from(account: VirtualAccount) -> Self {
        Self {
            id: account.id,
            customer_id: account.customer_id,
            beneficiary_id: account.beneficiary_id,
            account_number: account.account_number,
            kind: account.kind,
            status: account.status,
            total_credits: account.total_credits,
            total_debits: account.total_debits,
            current_balance: account.current_balance,
            auto_settlement: account.auto_settlement,
            settlement_threshold: account.settlement_threshold,
            last_activity_at: account.last_activity_at,
            created_at: account.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account(
        auto_settlement: bool,
        balance: Decimal,
        threshold: Decimal,
        beneficiary: bool,
    ) -> VirtualAccount {
        VirtualAccount {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            beneficiary_id: beneficiary.then(Uuid::new_v4),
            account_number: "VA-0000000001".to_string(),
            kind: "individual".to_string(),
            status: account_status::ACTIVE.to_string(),
            total_credits: balance,
            total_debits: Decimal::ZERO,
            current_balance: balance,
            platform_rate: dec!(0.01),
            primary_rate: dec!(0.0075),
            partner_rate: dec!(0.0025),
            auto_settlement,
            settlement_threshold: threshold,
            last_activity_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn sweep_triggers_once_threshold_is_reached() {
        // Balance 900 + credit 150 crosses a threshold of 1000.
        let acct = account(true, dec!(1050), dec!(1000), true);
        assert!(acct.should_trigger_sweep());
    }

    #[test]
    fn sweep_does_not_trigger_below_threshold() {
        let acct = account(true, dec!(900), dec!(1000), true);
        assert!(!acct.should_trigger_sweep());
    }

    #[test]
    fn sweep_does_not_trigger_when_auto_settlement_disabled() {
        let acct = account(false, dec!(1050), dec!(1000), true);
        assert!(!acct.should_trigger_sweep());
    }

    #[test]
    fn sweep_requires_a_beneficiary() {
        let acct = account(true, dec!(1050), dec!(1000), false);
        assert!(!acct.should_trigger_sweep());
    }

    #[test]
    fn rate_triple_must_sum_to_platform() {
        let ok = CommissionRates {
            platform: dec!(0.01),
            primary: dec!(0.0075),
            partner: dec!(0.0025),
        };
        assert!(ok.validate().is_ok());

        let bad = CommissionRates {
            platform: dec!(0.01),
            primary: dec!(0.05),
            partner: dec!(0.0025),
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn negative_rates_are_rejected() {
        let rates = CommissionRates {
            platform: dec!(0.01),
            primary: dec!(0.02),
            partner: dec!(-0.01),
        };
        assert!(rates.validate().is_err());
    }
}
