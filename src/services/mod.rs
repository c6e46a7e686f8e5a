//! Business logic services.
//!
//! Services contain the engine's core logic separated from HTTP handlers:
//! the ledger store, the commission calculator, the webhook transaction
//! processor, and the settlement orchestrator.

pub mod commission;
pub mod ledger;
pub mod settlement;
pub mod webhook_processor;
