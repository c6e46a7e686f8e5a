//! Inbound gateway webhook payloads.
//!
//! Two webhook contracts terminate here:
//!
//! 1. The payment gateway notifies us of money received on a virtual account
//!    (`PaymentNotification`), authenticated with an HMAC-SHA512 header.
//! 2. The bank gateway notifies us of the final status of a settlement batch
//!    (`SettlementStatusNotification`).
//!
//! # Acknowledgement contract
//!
//! The payment gateway retries any response other than `200 {"status": "ok"}`.
//! Payloads we can never process (unknown account, broken commission split)
//! are quarantined durably and then acknowledged so they are not retried.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Inbound payment notification from the payment gateway.
///
/// # JSON Example
///
/// ```json
/// {
///   "transaction_reference": "PG-20250114-000123",
///   "virtual_account_number": "VA-0482915573",
///   "principal_amount": "100000.00",
///   "settled_amount": "99500.00",
///   "fee_charged": "500.00",
///   "currency": "NGN",
///   "sender_name": "ADEBAYO OKAFOR",
///   "remarks": "premium payment",
///   "transaction_date": "2025-01-14T09:31:07"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentNotification {
    /// Globally unique gateway reference; the ledger's idempotency key
    pub transaction_reference: String,

    /// Virtual account number the payer remitted to
    pub virtual_account_number: String,

    /// Amount the payer remitted
    pub principal_amount: Decimal,

    /// Amount settled to the pooled account after the gateway's fee
    pub settled_amount: Decimal,

    /// Fee the gateway charged
    #[serde(default)]
    pub fee_charged: Decimal,

    #[serde(default = "default_currency")]
    pub currency: String,

    pub sender_name: Option<String>,
    pub remarks: Option<String>,

    /// When the payer's transaction happened.
    ///
    /// The gateway usually sends RFC 3339, but sometimes a bare
    /// `YYYY-MM-DDTHH:MM:SS` in its local UTC+01:00 clock with the offset
    /// dropped. Both forms normalize to UTC here.
    #[serde(deserialize_with = "deserialize_gateway_time")]
    pub transaction_date: DateTime<Utc>,
}

fn default_currency() -> String {
    "NGN".to_string()
}

impl PaymentNotification {
    /// Canonical string the gateway signs: account number, then the payer's
    /// amount rendered with two decimal places, then the reference,
    /// concatenated without separators. Must match the gateway's documented
    /// scheme byte for byte.
    pub fn signature_base(&self) -> String {
        format!(
            "{}{:.2}{}",
            self.virtual_account_number, self.principal_amount, self.transaction_reference
        )
    }
}

/// The payment gateway's clock runs at a fixed UTC+01:00 offset.
const GATEWAY_UTC_OFFSET_SECS: i32 = 3600;

/// Accepts RFC 3339 timestamps, or offset-less `YYYY-MM-DDTHH:MM:SS` /
/// `YYYY-MM-DD HH:MM:SS` values interpreted in the gateway's UTC+01:00 clock.
fn deserialize_gateway_time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_gateway_time(&raw).map_err(serde::de::Error::custom)
}

fn parse_gateway_time(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .map_err(|_| format!("unrecognized gateway timestamp: {raw}"))?;
    let offset = FixedOffset::east_opt(GATEWAY_UTC_OFFSET_SECS)
        .ok_or_else(|| "invalid gateway offset".to_string())?;
    naive
        .and_local_timezone(offset)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("ambiguous gateway timestamp: {raw}"))
}

/// Inbound settlement status notification from the bank gateway.
///
/// # JSON Example
///
/// ```json
/// {
///   "settlement_reference": "SB-7F2A3C1E9B04",
///   "status": "SUCCESS",
///   "gateway_reference": "NIP-000045678"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct SettlementStatusNotification {
    /// Our batch reference, quoted back by the bank
    pub settlement_reference: String,

    /// "SUCCESS" or "FAILED"
    pub status: String,

    pub gateway_reference: Option<String>,
}

impl SettlementStatusNotification {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("SUCCESS")
    }
}

/// Acknowledgement body returned to webhook callers.
///
/// `status` is `"ok"` once the outcome is durably committed — including the
/// duplicate and quarantined outcomes, which must not be retried.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl WebhookAck {
    pub fn ok() -> Self {
        Self {
            status: "ok",
            detail: None,
        }
    }

    pub fn ok_with_detail(detail: impl Into<String>) -> Self {
        Self {
            status: "ok",
            detail: Some(detail.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const NOTIFICATION_JSON: &str = r#"{
        "transaction_reference": "PG-20250114-000123",
        "virtual_account_number": "VA-0482915573",
        "principal_amount": "100000.00",
        "settled_amount": "99500.00",
        "fee_charged": "500.00",
        "currency": "NGN",
        "sender_name": "ADEBAYO OKAFOR",
        "remarks": "premium payment",
        "transaction_date": "2025-01-14T09:31:07"
    }"#;

    #[test]
    fn payment_notification_deserializes() {
        let n: PaymentNotification =
            serde_json::from_str(NOTIFICATION_JSON).expect("payload should deserialize");

        assert_eq!(n.transaction_reference, "PG-20250114-000123");
        assert_eq!(n.virtual_account_number, "VA-0482915573");
        assert_eq!(n.principal_amount, dec!(100000.00));
        assert_eq!(n.settled_amount, dec!(99500.00));
        assert_eq!(n.fee_charged, dec!(500.00));
        assert_eq!(n.sender_name.as_deref(), Some("ADEBAYO OKAFOR"));
    }

    #[test]
    fn offsetless_timestamp_is_read_as_gateway_local_time() {
        // 09:31:07 at UTC+01:00 is 08:31:07 UTC.
        let parsed = parse_gateway_time("2025-01-14T09:31:07").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-01-14T08:31:07+00:00");
    }

    #[test]
    fn rfc3339_timestamp_is_honored_as_sent() {
        let parsed = parse_gateway_time("2025-01-14T09:31:07+02:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-01-14T07:31:07+00:00");
    }

    #[test]
    fn garbage_timestamp_is_rejected() {
        assert!(parse_gateway_time("14/01/2025 09:31").is_err());
    }

    #[test]
    fn signature_base_concatenates_account_amount_reference() {
        let n: PaymentNotification = serde_json::from_str(NOTIFICATION_JSON).unwrap();
        assert_eq!(
            n.signature_base(),
            "VA-0482915573100000.00PG-20250114-000123"
        );
    }

    #[test]
    fn signature_base_pads_amount_to_two_decimals() {
        let json = NOTIFICATION_JSON.replace("\"100000.00\"", "\"250\"");
        let n: PaymentNotification = serde_json::from_str(&json).unwrap();
        assert_eq!(n.signature_base(), "VA-0482915573250.00PG-20250114-000123");
    }

    #[test]
    fn settlement_status_success_is_case_insensitive() {
        let n = SettlementStatusNotification {
            settlement_reference: "SB-1".to_string(),
            status: "success".to_string(),
            gateway_reference: None,
        };
        assert!(n.is_success());
    }
}
