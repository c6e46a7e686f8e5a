//! HTTP transport to the bank gateway.
//!
//! Bulk transfers are slow; the client's timeout comes from configuration
//! and defaults to 60 seconds. Every transport failure — connect errors,
//! timeouts, non-2xx statuses — surfaces as a transient gateway error, which
//! the settlement orchestrator answers by marking the batch failed and
//! leaving its transactions eligible for the next sweep.

use reqwest::header::CONTENT_TYPE;

use crate::{
    config::GatewaySettings,
    error::AppError,
    gateway::protocol::{self, GatewayAck, TransferRecord},
};

pub struct GatewayClient {
    http: reqwest::Client,
    settings: GatewaySettings,
}

impl GatewayClient {
    pub fn new(settings: GatewaySettings) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| AppError::Gateway(format!("failed to build gateway client: {e}")))?;

        Ok(Self { http, settings })
    }

    /// Submit one or more transfers and decode the synchronous
    /// acknowledgement. The acknowledgement is accept/reject of the request,
    /// not final settlement status — that arrives later on the status
    /// webhook.
    pub async fn submit_transfers(
        &self,
        transfers: &[TransferRecord],
    ) -> Result<GatewayAck, AppError> {
        let body = protocol::build_transfer_request(&self.settings, transfers)?;

        let response = self
            .http
            .post(&self.settings.url)
            .header(CONTENT_TYPE, "application/xml")
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("bank gateway unreachable: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::Gateway(format!("failed to read gateway response: {e}")))?;

        if !status.is_success() {
            return Err(AppError::Gateway(format!(
                "bank gateway returned HTTP {status}"
            )));
        }

        protocol::parse_gateway_response(&text)
    }
}
