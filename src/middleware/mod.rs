//! HTTP middleware components.

/// API key authentication middleware for the administrative routes
pub mod auth;
