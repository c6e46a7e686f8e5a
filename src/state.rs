//! Shared application state handed to every handler.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::{config::Config, db::DbPool, worker::SweepRequest};

/// Cloneable state: the connection pool, the loaded configuration, and the
/// sender side of the settlement work queue.
///
/// The queue is how the webhook processor hands a threshold-triggered sweep
/// to the settlement worker without blocking its own HTTP response.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub sweep_tx: mpsc::Sender<SweepRequest>,
}
