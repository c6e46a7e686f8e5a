//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! plus the request/response types exchanged with API clients and the
//! payment/bank gateways.

/// Virtual account model and commission rate configuration
pub mod account;
/// API key authentication model
pub mod api_key;
/// Beneficiary and settlement batch models
pub mod settlement;
/// Ledger transaction model
pub mod transaction;
/// Inbound gateway webhook payloads
pub mod webhook;
