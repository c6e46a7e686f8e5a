//! Webhook transaction processor - turns payment notifications into ledger
//! entries.
//!
//! State machine per inbound notification:
//!
//! 1. Verify the HMAC-SHA512 signature over the gateway's canonical field
//!    concatenation; reject (401, gateway retries) on mismatch or when the
//!    shared secret is unconfigured.
//! 2. Idempotency check: a known transaction reference short-circuits to
//!    success without touching balances. At-most-once ledger effect under
//!    at-least-once delivery.
//! 3. Resolve the virtual account; unknown account numbers are quarantined
//!    durably and acknowledged, not retried to success.
//! 4. Compute the commission split from the account's configured rates.
//! 5. Persist the transaction and apply it to the balances in one atomic
//!    step. A split that fails its own sum check is quarantined instead of
//!    being coerced — financial correctness outranks availability.
//! 6. Decide whether a settlement sweep should fire (the caller enqueues it;
//!    the HTTP response never waits on the bank gateway).
//!
//! The ledger never rejects a financially real credit because it mismatches
//! an external obligation; partial/over-payment reconciliation lives in the
//! premium subsystem.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use uuid::Uuid;

use crate::{
    config::Config,
    db::DbPool,
    error::{AppError, is_unique_violation},
    models::{
        account::VirtualAccount,
        transaction::{NewLedgerEntry, TransactionType, VaTransaction},
        webhook::PaymentNotification,
    },
    services::{commission, ledger},
};

type HmacSha512 = Hmac<Sha512>;

/// What processing a notification concluded. All three variants are
/// acknowledged with HTTP 200: each is a durably committed outcome the
/// gateway must not retry.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// A new ledger entry was booked.
    Booked {
        account: VirtualAccount,
        transaction: VaTransaction,
        /// Beneficiary to sweep, when the settlement threshold was crossed
        sweep_beneficiary: Option<Uuid>,
    },
    /// The reference was already applied; nothing changed.
    Duplicate { transaction: VaTransaction },
    /// The payload could not be booked and was parked for manual
    /// reconciliation.
    Quarantined { reason: String },
}

/// Verify the gateway's hex-encoded HMAC-SHA512 signature.
///
/// The signed message is `virtual_account_number + amount + reference`
/// ([`PaymentNotification::signature_base`]). Constant-time comparison via
/// `Mac::verify_slice`.
pub fn verify_signature(
    secret: &str,
    notification: &PaymentNotification,
    provided: &str,
) -> Result<(), AppError> {
    let provided = hex::decode(provided.trim()).map_err(|_| AppError::InvalidSignature)?;

    let mut mac =
        HmacSha512::new_from_slice(secret.as_bytes()).map_err(|_| AppError::InvalidSignature)?;
    mac.update(notification.signature_base().as_bytes());
    mac.verify_slice(&provided)
        .map_err(|_| AppError::InvalidSignature)
}

/// Run the full processing state machine for one notification.
///
/// Returns an error only for conditions the gateway should retry
/// (authentication, database unavailability). Every `Ok` outcome is durably
/// committed before this function returns.
pub async fn process_payment_notification(
    pool: &DbPool,
    config: &Config,
    notification: &PaymentNotification,
    signature: &str,
) -> Result<ProcessOutcome, AppError> {
    // Step 1: authenticate.
    let secret = config.webhook_secret()?;
    verify_signature(secret, notification, signature)?;

    // Step 2: idempotency. A replay is success, not an error.
    if let Some(existing) =
        ledger::find_transaction_by_reference(pool, &notification.transaction_reference).await?
    {
        tracing::info!(
            reference = %notification.transaction_reference,
            "duplicate webhook delivery short-circuited"
        );
        return Ok(ProcessOutcome::Duplicate {
            transaction: existing,
        });
    }

    // Step 3: resolve the account.
    let Some(account) =
        ledger::find_account_by_number(pool, &notification.virtual_account_number).await?
    else {
        let reason = format!(
            "no virtual account with number {}",
            notification.virtual_account_number
        );
        quarantine(pool, notification, &reason).await?;
        tracing::warn!(
            account_number = %notification.virtual_account_number,
            reference = %notification.transaction_reference,
            "webhook quarantined: unknown account"
        );
        return Ok(ProcessOutcome::Quarantined { reason });
    };

    if notification.settled_amount <= rust_decimal::Decimal::ZERO {
        let reason = format!(
            "non-positive settled amount {}",
            notification.settled_amount
        );
        quarantine(pool, notification, &reason).await?;
        return Ok(ProcessOutcome::Quarantined { reason });
    }

    // Step 4: commission split from the account's configured rates.
    let split = commission::split(notification.settled_amount, &account.rates());
    if !split.is_balanced() {
        let reason = format!(
            "commission split does not sum: {} + {} != {}",
            split.primary_share, split.partner_share, split.platform_total
        );
        quarantine(pool, notification, &reason).await?;
        tracing::error!(
            reference = %notification.transaction_reference,
            "webhook quarantined: {reason}"
        );
        return Ok(ProcessOutcome::Quarantined { reason });
    }

    // Step 5: book atomically.
    let entry = NewLedgerEntry {
        transaction_reference: notification.transaction_reference.clone(),
        transaction_type: TransactionType::Credit,
        principal_amount: notification.principal_amount,
        settled_amount: notification.settled_amount,
        fee_charged: notification.fee_charged,
        platform_commission: split.platform_total,
        primary_commission: split.primary_share,
        partner_commission: split.partner_share,
        currency: notification.currency.clone(),
        sender_name: notification.sender_name.clone(),
        remarks: notification.remarks.clone(),
        transacted_at: notification.transaction_date,
        settlement_batch_id: None,
    };

    let (account, transaction) = match ledger::apply_transaction(pool, account.id, &entry).await {
        Ok(applied) => applied,
        // A concurrent duplicate delivery won the insert race between our
        // step-2 lookup and here; the unique constraint closes the gap.
        Err(AppError::Database(db_err)) if is_unique_violation(&db_err) => {
            let existing =
                ledger::find_transaction_by_reference(pool, &notification.transaction_reference)
                    .await?
                    .ok_or(AppError::Database(db_err))?;
            return Ok(ProcessOutcome::Duplicate {
                transaction: existing,
            });
        }
        Err(other) => return Err(other),
    };

    tracing::info!(
        reference = %transaction.transaction_reference,
        account = %account.account_number,
        settled = %transaction.settled_amount,
        commission = %transaction.platform_commission,
        balance = %account.current_balance,
        "payment booked"
    );

    // Step 6: settlement trigger decision.
    let sweep_beneficiary = account
        .should_trigger_sweep()
        .then_some(account.beneficiary_id)
        .flatten();

    Ok(ProcessOutcome::Booked {
        account,
        transaction,
        sweep_beneficiary,
    })
}

/// Durably record a webhook we acknowledged but could not book.
async fn quarantine(
    pool: &DbPool,
    notification: &PaymentNotification,
    reason: &str,
) -> Result<(), AppError> {
    let payload = serde_json::to_value(notification)
        .map_err(|e| AppError::InvalidRequest(format!("unserializable payload: {e}")))?;

    sqlx::query("INSERT INTO quarantined_webhooks (payload, reason) VALUES ($1, $2)")
        .bind(payload)
        .bind(reason)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn notification() -> PaymentNotification {
        PaymentNotification {
            transaction_reference: "PG-20250114-000123".to_string(),
            virtual_account_number: "VA-0482915573".to_string(),
            principal_amount: dec!(100000.00),
            settled_amount: dec!(99500.00),
            fee_charged: dec!(500.00),
            currency: "NGN".to_string(),
            sender_name: Some("ADEBAYO OKAFOR".to_string()),
            remarks: None,
            transaction_date: Utc::now(),
        }
    }

    fn sign(secret: &str, notification: &PaymentNotification) -> String {
        let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(notification.signature_base().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_verifies() {
        let n = notification();
        let sig = sign("shared-secret", &n);
        assert!(verify_signature("shared-secret", &n, &sig).is_ok());
    }

    #[test]
    fn signature_with_wrong_secret_is_rejected() {
        let n = notification();
        let sig = sign("someone-elses-secret", &n);
        assert!(matches!(
            verify_signature("shared-secret", &n, &sig),
            Err(AppError::InvalidSignature)
        ));
    }

    #[test]
    fn tampered_amount_invalidates_the_signature() {
        let mut n = notification();
        let sig = sign("shared-secret", &n);
        n.principal_amount = dec!(200000.00);
        assert!(verify_signature("shared-secret", &n, &sig).is_err());
    }

    #[test]
    fn non_hex_signature_is_rejected() {
        let n = notification();
        assert!(matches!(
            verify_signature("shared-secret", &n, "not-hex!"),
            Err(AppError::InvalidSignature)
        ));
    }

    #[test]
    fn surrounding_whitespace_in_header_is_tolerated() {
        let n = notification();
        let sig = format!("  {}\n", sign("shared-secret", &n));
        assert!(verify_signature("shared-secret", &n, &sig).is_ok());
    }
}
