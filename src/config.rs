//! Application configuration management.
//!
//! Configuration is loaded from environment variables with the `envy` crate
//! (an optional `.env` file is read first via `dotenvy`). Commission rates
//! and thresholds are NOT here: they are per-account values passed explicitly
//! into the commission calculator and settlement orchestrator, so tests can
//! inject fixtures without touching shared state.

use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `PAYMENT_WEBHOOK_SECRET` (optional): shared HMAC-SHA512 secret for the
///   payment gateway's notifications; webhooks are rejected while unset
/// - `GATEWAY_URL`, `GATEWAY_ACCESS_CODE`, `GATEWAY_USERNAME`,
///   `GATEWAY_PASSWORD`, `GATEWAY_CHANNEL` (optional as a group): bank
///   gateway endpoint and credentials; sweeps park while any is unset
/// - `GATEWAY_TIMEOUT_SECS` (optional, default 60): bulk transfers are slow
/// - `SWEEP_INTERVAL_SECS` (optional, default 86400): scheduled full sweep
/// - `RECONCILE_INTERVAL_SECS` (optional, default 300): stale-batch re-check
/// - `STALE_BATCH_SECS` (optional, default 900): how long a batch may stay
///   `submitted` before reconciliation fails it
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    pub payment_webhook_secret: Option<String>,

    pub gateway_url: Option<String>,
    pub gateway_access_code: Option<String>,
    pub gateway_username: Option<String>,
    pub gateway_password: Option<String>,
    pub gateway_channel: Option<String>,

    #[serde(default = "default_gateway_timeout")]
    pub gateway_timeout_secs: u64,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,

    #[serde(default = "default_stale_batch")]
    pub stale_batch_secs: i64,
}

fn default_port() -> u16 {
    3000
}

fn default_gateway_timeout() -> u64 {
    60
}

fn default_sweep_interval() -> u64 {
    86_400
}

fn default_reconcile_interval() -> u64 {
    300
}

fn default_stale_batch() -> i64 {
    900
}

/// Bank gateway endpoint, credentials, and timeout, assembled from a fully
/// configured environment.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub url: String,
    pub access_code: String,
    pub username: String,
    pub password: String,
    pub channel: String,
    pub timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or unparseable.
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>()
    }

    /// The payment webhook shared secret.
    ///
    /// An unconfigured secret is an authentication failure for inbound
    /// notifications: nothing can be verified, so nothing is accepted.
    pub fn webhook_secret(&self) -> Result<&str, AppError> {
        self.payment_webhook_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(AppError::InvalidSignature)
    }

    /// Bank gateway settings, or a `Configuration` error naming the missing
    /// variable. Callers on the sweep path park the batch instead of failing.
    pub fn gateway(&self) -> Result<GatewaySettings, AppError> {
        let url = self.require_gateway_field(&self.gateway_url, "GATEWAY_URL")?;
        url::Url::parse(&url)
            .map_err(|_| AppError::Configuration(format!("GATEWAY_URL is not a valid URL: {url}")))?;

        Ok(GatewaySettings {
            url,
            access_code: self
                .require_gateway_field(&self.gateway_access_code, "GATEWAY_ACCESS_CODE")?,
            username: self.require_gateway_field(&self.gateway_username, "GATEWAY_USERNAME")?,
            password: self.require_gateway_field(&self.gateway_password, "GATEWAY_PASSWORD")?,
            channel: self.require_gateway_field(&self.gateway_channel, "GATEWAY_CHANNEL")?,
            timeout: Duration::from_secs(self.gateway_timeout_secs),
        })
    }

    fn require_gateway_field(
        &self,
        value: &Option<String>,
        name: &str,
    ) -> Result<String, AppError> {
        value
            .as_deref()
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::Configuration(format!("{name} is not configured")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            database_url: "postgres://localhost/test".to_string(),
            server_port: 3000,
            payment_webhook_secret: Some("secret".to_string()),
            gateway_url: Some("https://gateway.example.com/transfers".to_string()),
            gateway_access_code: Some("AC001".to_string()),
            gateway_username: Some("user".to_string()),
            gateway_password: Some("pass".to_string()),
            gateway_channel: Some("API".to_string()),
            gateway_timeout_secs: 60,
            sweep_interval_secs: 86_400,
            reconcile_interval_secs: 300,
            stale_batch_secs: 900,
        }
    }

    #[test]
    fn fully_configured_gateway_resolves() {
        let settings = config().gateway().expect("gateway should resolve");
        assert_eq!(settings.channel, "API");
        assert_eq!(settings.timeout, Duration::from_secs(60));
    }

    #[test]
    fn missing_credential_is_a_configuration_error() {
        let mut cfg = config();
        cfg.gateway_password = None;
        assert!(matches!(
            cfg.gateway(),
            Err(AppError::Configuration(msg)) if msg.contains("GATEWAY_PASSWORD")
        ));
    }

    #[test]
    fn invalid_gateway_url_is_rejected() {
        let mut cfg = config();
        cfg.gateway_url = Some("not a url".to_string());
        assert!(matches!(cfg.gateway(), Err(AppError::Configuration(_))));
    }

    #[test]
    fn unset_webhook_secret_is_an_authentication_failure() {
        let mut cfg = config();
        cfg.payment_webhook_secret = None;
        assert!(matches!(
            cfg.webhook_secret(),
            Err(AppError::InvalidSignature)
        ));
    }
}
