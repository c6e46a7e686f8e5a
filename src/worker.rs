//! Background settlement tasks.
//!
//! Three long-lived tokio tasks, all spawned at startup:
//!
//! - **Sweep worker**: consumes [`SweepRequest`]s off the mpsc channel the
//!   webhook processor fills when a balance crosses its threshold. This is
//!   the fire-and-forget handoff that keeps webhook acknowledgement from
//!   ever waiting on the bank gateway.
//! - **Daily sweep**: sweeps every beneficiary with eligible transactions on
//!   a fixed interval.
//! - **Reconciler**: fails batches stuck in `submitted` past the
//!   reconciliation window, releasing their transactions for the next sweep.
//!
//! Worker errors are logged and never tear the task down: a failed sweep
//! leaves its transactions eligible, so the next trigger or the daily sweep
//! retries them.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{config::Config, db::DbPool, services::settlement};

/// Capacity of the sweep trigger channel. A full queue drops the trigger
/// (logged); the daily sweep covers anything dropped.
pub const SWEEP_QUEUE_CAPACITY: usize = 256;

/// One threshold-triggered sweep request handed from the webhook processor
/// to the sweep worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepRequest {
    pub beneficiary_id: Uuid,
}

/// Spawn the sweep worker and return the sender the webhook path enqueues on.
pub fn spawn_sweep_worker(pool: DbPool, config: Arc<Config>) -> mpsc::Sender<SweepRequest> {
    let (tx, mut rx) = mpsc::channel::<SweepRequest>(SWEEP_QUEUE_CAPACITY);

    tokio::spawn(async move {
        tracing::info!("settlement sweep worker started");
        while let Some(request) = rx.recv().await {
            let beneficiary_id = request.beneficiary_id;
            match settlement::sweep_beneficiary(&pool, &config, beneficiary_id).await {
                Ok(outcome) => {
                    tracing::debug!(%beneficiary_id, ?outcome, "triggered sweep finished");
                }
                Err(err) => {
                    tracing::error!(%beneficiary_id, "triggered sweep failed: {err}");
                }
            }
        }
        tracing::info!("settlement sweep worker stopped; channel closed");
    });

    tx
}

/// Spawn the scheduled full sweep (all beneficiaries with eligible
/// transactions, default daily).
pub fn spawn_daily_sweep(pool: DbPool, config: Arc<Config>) {
    let period = Duration::from_secs(config.sweep_interval_secs);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick fires immediately; skip it so startup does not race
        // migrations-in-progress deployments.
        interval.tick().await;

        loop {
            interval.tick().await;
            if let Err(err) = settlement::sweep_all(&pool, &config).await {
                tracing::error!("scheduled sweep failed: {err}");
            }
        }
    });
}

/// Spawn the stale-batch reconciler: batches sitting in `submitted` longer
/// than the configured window are failed so their transactions re-enter
/// eligibility instead of hanging forever.
pub fn spawn_reconciler(pool: DbPool, config: Arc<Config>) {
    let period = Duration::from_secs(config.reconcile_interval_secs);
    let stale_after = config.stale_batch_secs;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;

        loop {
            interval.tick().await;
            match settlement::reconcile_stale(&pool, stale_after).await {
                Ok(0) => {}
                Ok(failed) => {
                    tracing::warn!(failed, "reconciler failed stale submitted batches");
                }
                Err(err) => {
                    tracing::error!("stale-batch reconciliation failed: {err}");
                }
            }
        }
    });
}
