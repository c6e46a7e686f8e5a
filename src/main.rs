//! Virtual Account Ledger & Settlement Engine - Main Application Entry Point
//!
//! A REST service that tracks per-customer prepaid virtual account balances,
//! turns payment-gateway webhook notifications into ledger entries with a
//! deterministic three-way commission split, and sweeps accumulated balances
//! into bulk bank-transfer settlement batches over the bank's XML protocol.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: API key (SHA-256) for admin routes; HMAC-SHA512
//!   signatures for the gateway webhooks
//! - **Money**: `rust_decimal::Decimal` end to end, never floats
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Spawn the settlement worker, daily sweep, and reconciler tasks
//! 5. Build HTTP router with routes and middleware
//! 6. Start server on configured port

mod config;
mod db;
mod error;
mod gateway;
mod handlers;
mod middleware;
mod models;
mod services;
mod state;
mod worker;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = Arc::new(config::Config::from_env()?);
    tracing::info!("Configuration loaded");

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    // Background settlement tasks. The sweep worker's channel sender goes
    // into the shared state so the webhook path can enqueue triggers.
    let sweep_tx = worker::spawn_sweep_worker(pool.clone(), config.clone());
    worker::spawn_daily_sweep(pool.clone(), config.clone());
    worker::spawn_reconciler(pool.clone(), config.clone());

    let state = AppState {
        pool,
        config: config.clone(),
        sweep_tx,
    };

    // Administrative routes, guarded by the API-key middleware
    let admin_routes = Router::new()
        // Virtual accounts
        .route(
            "/api/v1/accounts",
            post(handlers::accounts::get_or_create_account),
        )
        .route("/api/v1/accounts/{id}", get(handlers::accounts::get_account))
        .route(
            "/api/v1/accounts/{id}/close",
            post(handlers::accounts::close_account),
        )
        // Beneficiaries
        .route(
            "/api/v1/beneficiaries",
            post(handlers::beneficiaries::create_beneficiary),
        )
        .route(
            "/api/v1/beneficiaries/{id}",
            get(handlers::beneficiaries::get_beneficiary),
        )
        // Ledger transactions
        .route(
            "/api/v1/transactions/unsettled",
            get(handlers::transactions::list_unsettled),
        )
        .route(
            "/api/v1/transactions/{id}/freeze",
            post(handlers::transactions::freeze_transaction),
        )
        .route(
            "/api/v1/transactions/{id}/reverse",
            post(handlers::transactions::reverse_transaction),
        )
        // Settlements
        .route(
            "/api/v1/settlements/sweep/{beneficiary_id}",
            post(handlers::settlements::manual_sweep),
        )
        .route(
            "/api/v1/settlements/summary",
            get(handlers::settlements::settlement_summary),
        )
        .route(
            "/api/v1/settlements/{reference}",
            get(handlers::settlements::get_settlement),
        )
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    // Public routes: health plus the gateway-facing webhooks, which
    // authenticate with their own HMAC signatures instead of API keys.
    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/webhooks/payments",
            post(handlers::webhooks::receive_payment),
        )
        .route(
            "/webhooks/settlements",
            post(handlers::webhooks::receive_settlement_status),
        )
        .merge(admin_routes)
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Start serving HTTP requests
    // This blocks forever, handling requests concurrently with tokio
    axum::serve(listener, app).await?;

    Ok(())
}
