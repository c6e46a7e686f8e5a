//! Settlement orchestrator - sweeps eligible balances into bulk transfers.
//!
//! State machine per beneficiary sweep:
//!
//! 1. Select eligible transactions with `FOR UPDATE SKIP LOCKED`, so two
//!    concurrent sweeps for the same beneficiary can never pick the same row.
//! 2. If the beneficiary has no settlement bank account (or the gateway is
//!    unconfigured), create a `pending` unexecutable batch for manual
//!    follow-up and stop — the caller never sees an error.
//! 3. Aggregate gross / commission withheld / net.
//! 4. Insert the batch as `submitted` and provisionally link the selected
//!    transactions in the same database transaction; the link is what keeps
//!    them out of other sweeps once the row locks release.
//! 5. Call the bank gateway with no database locks held. Success finalizes
//!    the batch and books the outflow debits; failure or timeout marks it
//!    `failed` and unlinks the transactions so the next sweep retries them.
//! 6. The bank's asynchronous status webhook can later flip a `submitted`
//!    batch, idempotently per batch reference.
//!
//! Manual (admin) settlement and the scheduled daily sweep both funnel
//! through [`sweep_beneficiary`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    gateway::{
        client::GatewayClient,
        protocol::TransferRecord,
    },
    models::{
        settlement::{Beneficiary, SettlementBatch, SettlementSummaryRow, batch_status},
        transaction::{NewLedgerEntry, TransactionType, VaTransaction},
        webhook::SettlementStatusNotification,
    },
    services::ledger,
};

/// What one sweep concluded.
#[derive(Debug)]
pub enum SweepOutcome {
    /// No eligible transactions; nothing was created.
    NothingEligible,
    /// A non-executable batch was parked for manual follow-up.
    Parked(SettlementBatch),
    /// The transfer was acknowledged; the batch is terminal `success`.
    Settled(SettlementBatch),
    /// The gateway rejected the transfer or could not be reached; the batch
    /// is `failed` and its transactions are eligible again.
    Failed(SettlementBatch),
}

/// Aggregated amounts of a batch under construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchTotals {
    pub gross: Decimal,
    pub commission: Decimal,
    pub net: Decimal,
}

/// Sum the eligible transactions: gross is the settled amounts, commission is
/// the platform totals already recorded on them, net is the difference.
pub fn aggregate(transactions: &[VaTransaction]) -> BatchTotals {
    let gross: Decimal = transactions.iter().map(|t| t.settled_amount).sum();
    let commission: Decimal = transactions.iter().map(|t| t.platform_commission).sum();
    BatchTotals {
        gross,
        commission,
        net: gross - commission,
    }
}

struct BankDetails {
    bank_code: String,
    account_number: String,
    account_name: String,
}

fn bank_details_of(beneficiary: &Beneficiary) -> Option<BankDetails> {
    match (&beneficiary.bank_code, &beneficiary.bank_account_number) {
        (Some(bank_code), Some(account_number)) => Some(BankDetails {
            bank_code: bank_code.clone(),
            account_number: account_number.clone(),
            account_name: beneficiary
                .bank_account_name
                .clone()
                .unwrap_or_else(|| beneficiary.name.clone()),
        }),
        _ => None,
    }
}

/// Run one settlement sweep for a beneficiary.
pub async fn sweep_beneficiary(
    pool: &DbPool,
    config: &Config,
    beneficiary_id: Uuid,
) -> Result<SweepOutcome, AppError> {
    let beneficiary = find_beneficiary(pool, beneficiary_id)
        .await?
        .ok_or(AppError::BeneficiaryNotFound)?;

    // Resolve executability up front; either gap parks the batch.
    let park_reason = match (config.gateway(), bank_details_of(&beneficiary)) {
        (Ok(_), Some(_)) => None,
        (Err(AppError::Configuration(msg)), _) => Some(msg),
        (Err(other), _) => return Err(other),
        (_, None) => Some(format!(
            "beneficiary {} has no settlement bank account configured",
            beneficiary.name
        )),
    };

    let mut tx = pool.begin().await?;

    // SKIP LOCKED keeps concurrent sweeps from double-selecting.
    let eligible = sqlx::query_as::<_, VaTransaction>(
        r#"
        SELECT t.*
        FROM va_transactions t
        JOIN virtual_accounts a ON a.id = t.account_id
        WHERE t.status = 'completed'
          AND t.transaction_type = 'credit'
          AND t.frozen = FALSE
          AND t.settlement_batch_id IS NULL
          AND a.beneficiary_id = $1
        ORDER BY t.transacted_at ASC
        FOR UPDATE OF t SKIP LOCKED
        "#,
    )
    .bind(beneficiary_id)
    .fetch_all(&mut *tx)
    .await?;

    if eligible.is_empty() {
        tx.rollback().await?;
        return Ok(SweepOutcome::NothingEligible);
    }

    let totals = aggregate(&eligible);
    let batch_reference = generate_batch_reference();

    if let Some(reason) = park_reason {
        // Unexecutable: record the batch for manual follow-up, leave the
        // transactions unlinked so they stay visible as unsettled.
        let batch = sqlx::query_as::<_, SettlementBatch>(
            r#"
            INSERT INTO settlement_batches (
                beneficiary_id, batch_reference,
                gross_amount, commission_withheld, net_amount,
                status, failure_reason
            )
            VALUES ($1, $2, $3, $4, $5, 'pending', $6)
            RETURNING *
            "#,
        )
        .bind(beneficiary_id)
        .bind(&batch_reference)
        .bind(totals.gross)
        .bind(totals.commission)
        .bind(totals.net)
        .bind(&reason)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::warn!(
            beneficiary = %beneficiary.name,
            batch = %batch.batch_reference,
            "settlement parked: {reason}"
        );
        return Ok(SweepOutcome::Parked(batch));
    }

    let batch = sqlx::query_as::<_, SettlementBatch>(
        r#"
        INSERT INTO settlement_batches (
            beneficiary_id, batch_reference,
            gross_amount, commission_withheld, net_amount,
            status, submitted_at
        )
        VALUES ($1, $2, $3, $4, $5, 'submitted', NOW())
        RETURNING *
        "#,
    )
    .bind(beneficiary_id)
    .bind(&batch_reference)
    .bind(totals.gross)
    .bind(totals.commission)
    .bind(totals.net)
    .fetch_one(&mut *tx)
    .await?;

    let tx_ids: Vec<Uuid> = eligible.iter().map(|t| t.id).collect();
    sqlx::query("UPDATE va_transactions SET settlement_batch_id = $1 WHERE id = ANY($2)")
        .bind(batch.id)
        .bind(&tx_ids)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        beneficiary = %beneficiary.name,
        batch = %batch.batch_reference,
        transactions = eligible.len(),
        net = %totals.net,
        "settlement batch submitted"
    );

    // No database locks are held across the gateway call. park_reason was
    // None, so gateway() and bank_details_of() both resolve here.
    let settings = config.gateway()?;
    let bank = bank_details_of(&beneficiary).ok_or_else(|| {
        AppError::Configuration("beneficiary bank details disappeared mid-sweep".to_string())
    })?;

    let record = TransferRecord {
        amount: totals.net,
        payment_date: Utc::now().date_naive(),
        reference: batch.batch_reference.clone(),
        remarks: format!("settlement {}", batch.batch_reference),
        vendor_code: beneficiary.vendor_code.clone(),
        beneficiary_name: bank.account_name,
        account_number: bank.account_number,
        bank_code: bank.bank_code,
    };

    let client = GatewayClient::new(settings)?;
    match client.submit_transfers(&[record]).await {
        Ok(ack) if ack.is_success() => {
            let batch = finalize_success(pool, batch.id, ack.reference).await?;
            Ok(SweepOutcome::Settled(batch))
        }
        Ok(ack) => {
            let reason = format!("gateway rejected transfer: {} {}", ack.code, ack.description);
            tracing::error!(batch = %batch.batch_reference, "{reason}");
            let batch = mark_failed(pool, batch.id, &reason).await?;
            Ok(SweepOutcome::Failed(batch))
        }
        Err(AppError::Gateway(msg)) => {
            tracing::error!(batch = %batch.batch_reference, "gateway unreachable: {msg}");
            let batch = mark_failed(pool, batch.id, &msg).await?;
            Ok(SweepOutcome::Failed(batch))
        }
        Err(other) => Err(other),
    }
}

/// Sweep every beneficiary that currently has eligible transactions
/// (the scheduled daily settlement). Per-beneficiary failures are logged and
/// do not stop the rest of the sweep.
pub async fn sweep_all(pool: &DbPool, config: &Config) -> Result<(), AppError> {
    let beneficiary_ids: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT a.beneficiary_id
        FROM va_transactions t
        JOIN virtual_accounts a ON a.id = t.account_id
        WHERE t.status = 'completed'
          AND t.transaction_type = 'credit'
          AND t.frozen = FALSE
          AND t.settlement_batch_id IS NULL
          AND a.beneficiary_id IS NOT NULL
        "#,
    )
    .fetch_all(pool)
    .await?;

    tracing::info!(beneficiaries = beneficiary_ids.len(), "daily sweep starting");

    for beneficiary_id in beneficiary_ids {
        match sweep_beneficiary(pool, config, beneficiary_id).await {
            Ok(outcome) => {
                tracing::debug!(%beneficiary_id, ?outcome, "sweep finished");
            }
            Err(err) => {
                tracing::error!(%beneficiary_id, "sweep failed: {err}");
            }
        }
    }

    Ok(())
}

/// Apply the bank gateway's asynchronous status notification to its batch.
///
/// Idempotent per batch reference: a batch already in a terminal state is
/// returned unchanged.
pub async fn apply_status_notification(
    pool: &DbPool,
    notification: &SettlementStatusNotification,
) -> Result<SettlementBatch, AppError> {
    let batch = find_batch_by_reference(pool, &notification.settlement_reference)
        .await?
        .ok_or(AppError::SettlementNotFound)?;

    if batch.is_terminal() {
        tracing::info!(
            batch = %batch.batch_reference,
            status = %batch.status,
            "status webhook replay ignored; batch already terminal"
        );
        return Ok(batch);
    }

    if batch.status == batch_status::PENDING {
        return Err(AppError::InvalidRequest(format!(
            "batch {} was never submitted",
            batch.batch_reference
        )));
    }

    if notification.is_success() {
        finalize_success(pool, batch.id, notification.gateway_reference.clone()).await
    } else {
        mark_failed(pool, batch.id, "bank gateway reported settlement failure").await
    }
}

/// Fail every batch that has sat in `submitted` longer than the
/// reconciliation window, releasing its transactions for the next sweep.
/// Returns how many batches were failed.
pub async fn reconcile_stale(pool: &DbPool, stale_after_secs: i64) -> Result<u64, AppError> {
    let stale_ids: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT id FROM settlement_batches
        WHERE status = 'submitted'
          AND submitted_at < NOW() - ($1::bigint * INTERVAL '1 second')
        "#,
    )
    .bind(stale_after_secs)
    .fetch_all(pool)
    .await?;

    let mut failed = 0u64;
    for batch_id in stale_ids {
        let batch = mark_failed(
            pool,
            batch_id,
            "no gateway acknowledgement within the reconciliation window",
        )
        .await?;
        tracing::warn!(batch = %batch.batch_reference, "stale submitted batch failed");
        failed += 1;
    }

    Ok(failed)
}

/// Per-account share of a successful batch, used to book the outflow debits.
#[derive(Debug, sqlx::FromRow)]
struct Contribution {
    account_id: Uuid,
    gross: Decimal,
    commission: Decimal,
}

/// Finalize a submitted batch as successful: record the gateway reference,
/// make the transaction linkage permanent, and book per-account `settlement`
/// (net) and `commission` debits so each balance drops by its gross
/// contribution. Idempotent: a batch no longer in `submitted` is returned
/// as-is.
async fn finalize_success(
    pool: &DbPool,
    batch_id: Uuid,
    gateway_reference: Option<String>,
) -> Result<SettlementBatch, AppError> {
    let mut tx = pool.begin().await?;

    let Some(batch) = sqlx::query_as::<_, SettlementBatch>(
        r#"
        UPDATE settlement_batches
        SET status = 'success',
            gateway_reference = COALESCE($2, gateway_reference),
            completed_at = NOW()
        WHERE id = $1 AND status = 'submitted'
        RETURNING *
        "#,
    )
    .bind(batch_id)
    .bind(&gateway_reference)
    .fetch_optional(&mut *tx)
    .await?
    else {
        tx.rollback().await?;
        return find_batch(pool, batch_id).await;
    };

    let contributions = sqlx::query_as::<_, Contribution>(
        r#"
        SELECT account_id,
               SUM(settled_amount) AS gross,
               SUM(platform_commission) AS commission
        FROM va_transactions
        WHERE settlement_batch_id = $1
        GROUP BY account_id
        "#,
    )
    .bind(batch_id)
    .fetch_all(&mut *tx)
    .await?;

    for c in &contributions {
        let net = c.gross - c.commission;
        let settlement_entry = NewLedgerEntry {
            transaction_reference: format!(
                "STL-{}-{}",
                batch.batch_reference,
                c.account_id.simple()
            ),
            transaction_type: TransactionType::Settlement,
            principal_amount: net,
            settled_amount: net,
            fee_charged: Decimal::ZERO,
            platform_commission: Decimal::ZERO,
            primary_commission: Decimal::ZERO,
            partner_commission: Decimal::ZERO,
            currency: "NGN".to_string(),
            sender_name: None,
            remarks: Some(format!("settlement batch {}", batch.batch_reference)),
            transacted_at: Utc::now(),
            settlement_batch_id: Some(batch.id),
        };
        ledger::apply_entry(&mut *tx, c.account_id, &settlement_entry).await?;

        if c.commission > Decimal::ZERO {
            let commission_entry = NewLedgerEntry {
                transaction_reference: format!(
                    "COM-{}-{}",
                    batch.batch_reference,
                    c.account_id.simple()
                ),
                transaction_type: TransactionType::Commission,
                principal_amount: c.commission,
                settled_amount: c.commission,
                fee_charged: Decimal::ZERO,
                platform_commission: Decimal::ZERO,
                primary_commission: Decimal::ZERO,
                partner_commission: Decimal::ZERO,
                currency: "NGN".to_string(),
                sender_name: None,
                remarks: Some(format!(
                    "commission withheld, batch {}",
                    batch.batch_reference
                )),
                transacted_at: Utc::now(),
                settlement_batch_id: Some(batch.id),
            };
            ledger::apply_entry(&mut *tx, c.account_id, &commission_entry).await?;
        }
    }

    tx.commit().await?;

    tracing::info!(
        batch = %batch.batch_reference,
        gateway_reference = ?batch.gateway_reference,
        net = %batch.net_amount,
        "settlement batch succeeded"
    );
    Ok(batch)
}

/// Mark a submitted batch failed and release its transactions back into
/// eligibility. Idempotent: a batch no longer in `submitted` is returned
/// as-is.
async fn mark_failed(
    pool: &DbPool,
    batch_id: Uuid,
    reason: &str,
) -> Result<SettlementBatch, AppError> {
    let mut tx = pool.begin().await?;

    let Some(batch) = sqlx::query_as::<_, SettlementBatch>(
        r#"
        UPDATE settlement_batches
        SET status = 'failed', failure_reason = $2, completed_at = NOW()
        WHERE id = $1 AND status = 'submitted'
        RETURNING *
        "#,
    )
    .bind(batch_id)
    .bind(reason)
    .fetch_optional(&mut *tx)
    .await?
    else {
        tx.rollback().await?;
        return find_batch(pool, batch_id).await;
    };

    sqlx::query(
        r#"
        UPDATE va_transactions
        SET settlement_batch_id = NULL
        WHERE settlement_batch_id = $1 AND transaction_type = 'credit'
        "#,
    )
    .bind(batch_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(batch)
}

pub async fn find_beneficiary(
    pool: &DbPool,
    beneficiary_id: Uuid,
) -> Result<Option<Beneficiary>, AppError> {
    let beneficiary =
        sqlx::query_as::<_, Beneficiary>("SELECT * FROM beneficiaries WHERE id = $1")
            .bind(beneficiary_id)
            .fetch_optional(pool)
            .await?;
    Ok(beneficiary)
}

pub async fn find_batch_by_reference(
    pool: &DbPool,
    reference: &str,
) -> Result<Option<SettlementBatch>, AppError> {
    let batch = sqlx::query_as::<_, SettlementBatch>(
        "SELECT * FROM settlement_batches WHERE batch_reference = $1",
    )
    .bind(reference)
    .fetch_optional(pool)
    .await?;
    Ok(batch)
}

async fn find_batch(pool: &DbPool, batch_id: Uuid) -> Result<SettlementBatch, AppError> {
    sqlx::query_as::<_, SettlementBatch>("SELECT * FROM settlement_batches WHERE id = $1")
        .bind(batch_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::SettlementNotFound)
}

/// Per-status batch aggregates over a creation-date range.
pub async fn settlement_summary(
    pool: &DbPool,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<Vec<SettlementSummaryRow>, AppError> {
    let rows = sqlx::query_as::<_, SettlementSummaryRow>(
        r#"
        SELECT status,
               COUNT(*) AS batch_count,
               COALESCE(SUM(gross_amount), 0) AS gross_amount,
               COALESCE(SUM(commission_withheld), 0) AS commission_withheld,
               COALESCE(SUM(net_amount), 0) AS net_amount
        FROM settlement_batches
        WHERE ($1::timestamptz IS NULL OR created_at >= $1)
          AND ($2::timestamptz IS NULL OR created_at < $2)
        GROUP BY status
        ORDER BY status
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

fn generate_batch_reference() -> String {
    let bytes: [u8; 6] = rand::random();
    format!("SB-{}", hex::encode_upper(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::transaction::tx_status;
    use rust_decimal_macros::dec;

    fn eligible_tx(settled: Decimal, commission: Decimal) -> VaTransaction {
        VaTransaction {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            transaction_reference: Uuid::new_v4().to_string(),
            transaction_type: "credit".to_string(),
            status: tx_status::COMPLETED.to_string(),
            principal_amount: settled,
            settled_amount: settled,
            fee_charged: Decimal::ZERO,
            platform_commission: commission,
            primary_commission: Decimal::ZERO,
            partner_commission: Decimal::ZERO,
            currency: "NGN".to_string(),
            sender_name: None,
            remarks: None,
            transacted_at: Utc::now(),
            received_at: Utc::now(),
            settlement_batch_id: None,
            frozen: false,
            frozen_reason: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn aggregate_sums_gross_commission_and_net() {
        let txs = vec![
            eligible_tx(dec!(100000.00), dec!(1000.00)),
            eligible_tx(dec!(25000.00), dec!(250.00)),
            eligible_tx(dec!(40.50), dec!(0.41)),
        ];

        let totals = aggregate(&txs);
        assert_eq!(totals.gross, dec!(125040.50));
        assert_eq!(totals.commission, dec!(1250.41));
        assert_eq!(totals.net, dec!(123790.09));
    }

    #[test]
    fn aggregate_of_nothing_is_zero() {
        let totals = aggregate(&[]);
        assert_eq!(totals.gross, Decimal::ZERO);
        assert_eq!(totals.commission, Decimal::ZERO);
        assert_eq!(totals.net, Decimal::ZERO);
    }

    #[test]
    fn gross_always_equals_commission_plus_net() {
        let txs = vec![
            eligible_tx(dec!(0.01), dec!(0.01)),
            eligible_tx(dec!(9999.99), dec!(73.12)),
        ];
        let totals = aggregate(&txs);
        assert_eq!(totals.gross, totals.commission + totals.net);
    }

    #[test]
    fn batch_references_are_prefixed_and_unique() {
        let a = generate_batch_reference();
        let b = generate_batch_reference();
        assert!(a.starts_with("SB-"));
        assert_eq!(a.len(), 15);
        assert_ne!(a, b);
    }

    #[test]
    fn beneficiaries_without_bank_details_are_not_executable() {
        let beneficiary = Beneficiary {
            id: Uuid::new_v4(),
            name: "Acme Assurance".to_string(),
            vendor_code: "ACME01".to_string(),
            bank_code: Some("058".to_string()),
            bank_account_number: None,
            bank_account_name: None,
            created_at: Utc::now(),
        };
        assert!(bank_details_of(&beneficiary).is_none());
    }

    #[test]
    fn bank_account_name_falls_back_to_beneficiary_name() {
        let beneficiary = Beneficiary {
            id: Uuid::new_v4(),
            name: "Acme Assurance".to_string(),
            vendor_code: "ACME01".to_string(),
            bank_code: Some("058".to_string()),
            bank_account_number: Some("0123456789".to_string()),
            bank_account_name: None,
            created_at: Utc::now(),
        };
        let details = bank_details_of(&beneficiary).unwrap();
        assert_eq!(details.account_name, "Acme Assurance");
    }
}
