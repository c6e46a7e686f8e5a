//! Ledger store - durable record of virtual accounts and their transactions.
//!
//! Pure data access, no business rules: callers decide what to book, this
//! module makes it atomic. Balance mutation is serialized per account with
//! `SELECT ... FOR UPDATE` row locks, so credit application is linearizable
//! per account while different accounts proceed fully in parallel.
//!
//! # Atomicity
//!
//! `apply_transaction` updates the account totals and inserts the transaction
//! row inside one PostgreSQL transaction: both persist or neither does. The
//! balance column is always written as `total_credits - total_debits`, never
//! as an independent increment.

use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        account::{CreateAccountRequest, VirtualAccount, account_status},
        transaction::{NewLedgerEntry, VaTransaction, tx_status},
    },
};

/// Return the existing account for a customer+kind pair, or create one with
/// the requested rates.
///
/// Create-then-retry-on-conflict: concurrent callers for the same customer
/// race on the unique constraint and all converge on the single surviving
/// row. When the account already exists, the rates in the request are
/// ignored.
pub async fn get_or_create_account(
    pool: &DbPool,
    request: &CreateAccountRequest,
) -> Result<VirtualAccount, AppError> {
    request.rates().validate().map_err(AppError::InvalidRequest)?;
    if request.settlement_threshold.is_sign_negative() {
        return Err(AppError::InvalidRequest(
            "settlement threshold must not be negative".to_string(),
        ));
    }

    let inserted = sqlx::query_as::<_, VirtualAccount>(
        r#"
        INSERT INTO virtual_accounts (
            customer_id,
            beneficiary_id,
            account_number,
            kind,
            platform_rate,
            primary_rate,
            partner_rate,
            auto_settlement,
            settlement_threshold
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (customer_id, kind) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(request.customer_id)
    .bind(request.beneficiary_id)
    .bind(generate_account_number())
    .bind(request.kind.as_str())
    .bind(request.platform_rate)
    .bind(request.primary_rate)
    .bind(request.partner_rate)
    .bind(request.auto_settlement)
    .bind(request.settlement_threshold)
    .fetch_optional(pool)
    .await?;

    if let Some(account) = inserted {
        return Ok(account);
    }

    // Lost the race (or the account predates this call): fetch the winner.
    sqlx::query_as::<_, VirtualAccount>(
        "SELECT * FROM virtual_accounts WHERE customer_id = $1 AND kind = $2",
    )
    .bind(request.customer_id)
    .bind(request.kind.as_str())
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::AccountNotFound)
}

/// Atomically apply a ledger entry to an account.
///
/// Wraps [`apply_entry`] in its own database transaction. A duplicate
/// transaction reference surfaces as a unique-violation database error,
/// which the webhook processor maps onto the idempotent success path.
pub async fn apply_transaction(
    pool: &DbPool,
    account_id: Uuid,
    entry: &NewLedgerEntry,
) -> Result<(VirtualAccount, VaTransaction), AppError> {
    let mut tx = pool.begin().await?;
    let applied = apply_entry(&mut *tx, account_id, entry).await?;
    tx.commit().await?;
    Ok(applied)
}

/// Core of transaction application, usable inside a caller-owned database
/// transaction (the settlement orchestrator books its finalization debits in
/// the same scope as the batch update).
pub(crate) async fn apply_entry(
    conn: &mut PgConnection,
    account_id: Uuid,
    entry: &NewLedgerEntry,
) -> Result<(VirtualAccount, VaTransaction), AppError> {
    // Row lock serializes balance mutation for this account.
    let account = sqlx::query_as::<_, VirtualAccount>(
        "SELECT * FROM virtual_accounts WHERE id = $1 FOR UPDATE",
    )
    .bind(account_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::AccountNotFound)?;

    if account.is_closed() {
        return Err(AppError::InvalidRequest(
            "account is closed".to_string(),
        ));
    }

    let (credit_delta, debit_delta) = entry.deltas();

    let account = sqlx::query_as::<_, VirtualAccount>(
        r#"
        UPDATE virtual_accounts
        SET total_credits = total_credits + $1,
            total_debits = total_debits + $2,
            current_balance = (total_credits + $1) - (total_debits + $2),
            last_activity_at = NOW(),
            updated_at = NOW()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(credit_delta)
    .bind(debit_delta)
    .bind(account_id)
    .fetch_one(&mut *conn)
    .await?;

    let transaction = sqlx::query_as::<_, VaTransaction>(
        r#"
        INSERT INTO va_transactions (
            account_id,
            transaction_reference,
            transaction_type,
            status,
            principal_amount,
            settled_amount,
            fee_charged,
            platform_commission,
            primary_commission,
            partner_commission,
            currency,
            sender_name,
            remarks,
            transacted_at,
            settlement_batch_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING *
        "#,
    )
    .bind(account_id)
    .bind(&entry.transaction_reference)
    .bind(entry.transaction_type.as_str())
    .bind(tx_status::COMPLETED)
    .bind(entry.principal_amount)
    .bind(entry.settled_amount)
    .bind(entry.fee_charged)
    .bind(entry.platform_commission)
    .bind(entry.primary_commission)
    .bind(entry.partner_commission)
    .bind(&entry.currency)
    .bind(&entry.sender_name)
    .bind(&entry.remarks)
    .bind(entry.transacted_at)
    .bind(entry.settlement_batch_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok((account, transaction))
}

/// Look up a transaction by its gateway reference (the idempotency check).
pub async fn find_transaction_by_reference(
    pool: &DbPool,
    reference: &str,
) -> Result<Option<VaTransaction>, AppError> {
    let transaction = sqlx::query_as::<_, VaTransaction>(
        "SELECT * FROM va_transactions WHERE transaction_reference = $1",
    )
    .bind(reference)
    .fetch_optional(pool)
    .await?;

    Ok(transaction)
}

/// Completed, unfrozen, unsettled credit transactions, optionally filtered by
/// beneficiary, oldest first for fairness.
pub async fn list_settlement_eligible(
    pool: &DbPool,
    beneficiary_id: Option<Uuid>,
) -> Result<Vec<VaTransaction>, AppError> {
    let transactions = sqlx::query_as::<_, VaTransaction>(
        r#"
        SELECT t.*
        FROM va_transactions t
        JOIN virtual_accounts a ON a.id = t.account_id
        WHERE t.status = 'completed'
          AND t.transaction_type = 'credit'
          AND t.frozen = FALSE
          AND t.settlement_batch_id IS NULL
          AND ($1::uuid IS NULL OR a.beneficiary_id = $1)
        ORDER BY t.transacted_at ASC
        "#,
    )
    .bind(beneficiary_id)
    .fetch_all(pool)
    .await?;

    Ok(transactions)
}

/// Fetch an account by id.
pub async fn find_account(pool: &DbPool, account_id: Uuid) -> Result<VirtualAccount, AppError> {
    sqlx::query_as::<_, VirtualAccount>("SELECT * FROM virtual_accounts WHERE id = $1")
        .bind(account_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::AccountNotFound)
}

/// Fetch an account by its gateway-style account number.
pub async fn find_account_by_number(
    pool: &DbPool,
    account_number: &str,
) -> Result<Option<VirtualAccount>, AppError> {
    let account = sqlx::query_as::<_, VirtualAccount>(
        "SELECT * FROM virtual_accounts WHERE account_number = $1",
    )
    .bind(account_number)
    .fetch_optional(pool)
    .await?;

    Ok(account)
}

/// Soft-delete an account by transitioning it to `closed`.
///
/// Closure is rejected while the balance is non-zero; closing an already
/// closed account is a no-op.
pub async fn close_account(pool: &DbPool, account_id: Uuid) -> Result<VirtualAccount, AppError> {
    let mut tx = pool.begin().await?;

    let account = sqlx::query_as::<_, VirtualAccount>(
        "SELECT * FROM virtual_accounts WHERE id = $1 FOR UPDATE",
    )
    .bind(account_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::AccountNotFound)?;

    if account.is_closed() {
        tx.rollback().await?;
        return Ok(account);
    }

    if account.current_balance != Decimal::ZERO {
        tx.rollback().await?;
        return Err(AppError::InvalidRequest(format!(
            "account balance must be zero before closure (currently {})",
            account.current_balance
        )));
    }

    let account = sqlx::query_as::<_, VirtualAccount>(
        "UPDATE virtual_accounts SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(account_status::CLOSED)
    .bind(account_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(account)
}

/// Place a compliance hold on a transaction, excluding it from settlement
/// eligibility. Transactions already linked to a batch cannot be frozen.
pub async fn freeze_transaction(
    pool: &DbPool,
    transaction_id: Uuid,
    reason: &str,
) -> Result<VaTransaction, AppError> {
    let frozen = sqlx::query_as::<_, VaTransaction>(
        r#"
        UPDATE va_transactions
        SET frozen = TRUE, frozen_reason = $2
        WHERE id = $1 AND settlement_batch_id IS NULL
        RETURNING *
        "#,
    )
    .bind(transaction_id)
    .bind(reason)
    .fetch_optional(pool)
    .await?;

    match frozen {
        Some(transaction) => Ok(transaction),
        None => {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM va_transactions WHERE id = $1)")
                    .bind(transaction_id)
                    .fetch_one(pool)
                    .await?;
            if exists {
                Err(AppError::InvalidRequest(
                    "transaction is already linked to a settlement batch".to_string(),
                ))
            } else {
                Err(AppError::TransactionNotFound)
            }
        }
    }
}

/// Reverse a completed, unsettled credit: the original row transitions to
/// `reversed` and an offsetting refund debit is booked in the same atomic
/// scope, so the balance drops by the settled amount exactly once.
pub async fn reverse_transaction(
    pool: &DbPool,
    transaction_id: Uuid,
) -> Result<(VaTransaction, VaTransaction), AppError> {
    let mut tx = pool.begin().await?;

    let original = sqlx::query_as::<_, VaTransaction>(
        "SELECT * FROM va_transactions WHERE id = $1 FOR UPDATE",
    )
    .bind(transaction_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::TransactionNotFound)?;

    if !original.is_completed() || original.transaction_type != "credit" {
        tx.rollback().await?;
        return Err(AppError::InvalidRequest(
            "only completed credit transactions can be reversed".to_string(),
        ));
    }
    if original.settlement_batch_id.is_some() {
        tx.rollback().await?;
        return Err(AppError::InvalidRequest(
            "transaction has already been settled".to_string(),
        ));
    }

    let reversed = sqlx::query_as::<_, VaTransaction>(
        "UPDATE va_transactions SET status = $1 WHERE id = $2 RETURNING *",
    )
    .bind(tx_status::REVERSED)
    .bind(transaction_id)
    .fetch_one(&mut *tx)
    .await?;

    let refund_entry = NewLedgerEntry {
        transaction_reference: format!("RFD-{}", original.transaction_reference),
        transaction_type: crate::models::transaction::TransactionType::Refund,
        principal_amount: original.settled_amount,
        settled_amount: original.settled_amount,
        fee_charged: Decimal::ZERO,
        platform_commission: Decimal::ZERO,
        primary_commission: Decimal::ZERO,
        partner_commission: Decimal::ZERO,
        currency: original.currency.clone(),
        sender_name: original.sender_name.clone(),
        remarks: Some(format!("reversal of {}", original.transaction_reference)),
        transacted_at: chrono::Utc::now(),
        settlement_batch_id: None,
    };
    let (_, refund) = apply_entry(&mut *tx, original.account_id, &refund_entry).await?;

    tx.commit().await?;
    Ok((reversed, refund))
}

fn generate_account_number() -> String {
    let digits: u64 = rand::random::<u64>() % 10_000_000_000;
    format!("VA-{digits:010}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_numbers_carry_ten_digits() {
        for _ in 0..32 {
            let number = generate_account_number();
            assert_eq!(number.len(), 13);
            assert!(number.starts_with("VA-"));
            assert!(number[3..].chars().all(|c| c.is_ascii_digit()));
        }
    }
}
