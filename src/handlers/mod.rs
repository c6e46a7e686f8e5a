pub mod accounts;
pub mod beneficiaries;
pub mod health;
pub mod settlements;
pub mod transactions;
pub mod webhooks;
