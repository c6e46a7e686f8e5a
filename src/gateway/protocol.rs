//! XML wire protocol of the bank's bulk/single transfer gateway.
//!
//! # Request
//!
//! A `<BulkTransferRequest>` document containing the authentication
//! credentials (access code, username, password, channel) followed by a
//! `<Transfers>` list of `<Transfer>` records.
//!
//! # Response — the double-XML envelope quirk
//!
//! The gateway answers with an outer `<Response>` element whose TEXT content
//! is itself an XML document carrying `<ResponseCode>` and
//! `<ResponseDescription>`. This is an external-protocol fact, not a design
//! to emulate: decoding is a two-pass parse (outer generic XML parse, then a
//! parse of the extracted inner string). A missing or malformed inner
//! document is a protocol error, which the settlement orchestrator treats as
//! transient (batch failed, eligible for retry), never as a permanent
//! settlement rejection.

use std::fmt::Display;

use chrono::NaiveDate;
use quick_xml::{
    Reader, Writer,
    events::{BytesStart, BytesText, Event},
};
use rust_decimal::Decimal;

use crate::{config::GatewaySettings, error::AppError};

/// Response code the gateway uses for an accepted transfer.
const RESPONSE_CODE_SUCCESS: &str = "00";

/// One transfer within a bulk request.
#[derive(Debug, Clone)]
pub struct TransferRecord {
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub reference: String,
    pub remarks: String,
    /// Vendor code the gateway knows the beneficiary by
    pub vendor_code: String,
    pub beneficiary_name: String,
    pub account_number: String,
    pub bank_code: String,
}

/// The gateway's synchronous acknowledgement (accept/reject of the request,
/// not final settlement status).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayAck {
    pub code: String,
    pub description: String,
    /// The gateway's own reference for the accepted transfer
    pub reference: Option<String>,
}

impl GatewayAck {
    pub fn is_success(&self) -> bool {
        self.code == RESPONSE_CODE_SUCCESS
    }
}

fn encode_err(err: impl Display) -> AppError {
    AppError::Gateway(format!("failed to encode transfer request: {err}"))
}

fn decode_err(err: impl Display) -> AppError {
    AppError::Gateway(format!("malformed gateway response: {err}"))
}

/// Encode a bulk transfer request document.
pub fn build_transfer_request(
    settings: &GatewaySettings,
    transfers: &[TransferRecord],
) -> Result<String, AppError> {
    let mut writer = Writer::new(Vec::new());

    writer
        .write_event(Event::Start(BytesStart::new("BulkTransferRequest")))
        .map_err(encode_err)?;

    text_element(&mut writer, "AccessCode", &settings.access_code)?;
    text_element(&mut writer, "Username", &settings.username)?;
    text_element(&mut writer, "Password", &settings.password)?;
    text_element(&mut writer, "Channel", &settings.channel)?;

    writer
        .write_event(Event::Start(BytesStart::new("Transfers")))
        .map_err(encode_err)?;

    for transfer in transfers {
        writer
            .write_event(Event::Start(BytesStart::new("Transfer")))
            .map_err(encode_err)?;
        text_element(&mut writer, "Amount", &format!("{:.2}", transfer.amount))?;
        text_element(
            &mut writer,
            "PaymentDate",
            &transfer.payment_date.format("%Y-%m-%d").to_string(),
        )?;
        text_element(&mut writer, "TransactionReference", &transfer.reference)?;
        text_element(&mut writer, "Remarks", &transfer.remarks)?;
        text_element(&mut writer, "VendorCode", &transfer.vendor_code)?;
        text_element(&mut writer, "VendorName", &transfer.beneficiary_name)?;
        text_element(&mut writer, "AccountNumber", &transfer.account_number)?;
        text_element(&mut writer, "BankCode", &transfer.bank_code)?;
        writer
            .write_event(Event::End(BytesStart::new("Transfer").to_end()))
            .map_err(encode_err)?;
    }

    writer
        .write_event(Event::End(BytesStart::new("Transfers").to_end()))
        .map_err(encode_err)?;
    writer
        .write_event(Event::End(BytesStart::new("BulkTransferRequest").to_end()))
        .map_err(encode_err)?;

    String::from_utf8(writer.into_inner())
        .map_err(|_| AppError::Gateway("transfer request is not valid UTF-8".to_string()))
}

fn text_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: &str,
) -> Result<(), AppError> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(value))
        .map(|_| ())
        .map_err(encode_err)
}

/// Decode the gateway's double-encoded response envelope.
pub fn parse_gateway_response(body: &str) -> Result<GatewayAck, AppError> {
    // First pass: the outer document. Its <Response> text IS the payload.
    let inner = extract_element_text(body, "Response")?
        .ok_or_else(|| decode_err("missing <Response> envelope"))?;
    if inner.trim().is_empty() {
        return Err(decode_err("empty inner document"));
    }

    // Second pass: the extracted inner document.
    let code = extract_element_text(&inner, "ResponseCode")?
        .ok_or_else(|| decode_err("inner document carries no <ResponseCode>"))?;
    let description = extract_element_text(&inner, "ResponseDescription")?.unwrap_or_default();
    let reference = extract_element_text(&inner, "TransactionReference")?;

    Ok(GatewayAck {
        code,
        description,
        reference,
    })
}

/// Text content of the first occurrence of `tag`, or `None` when the element
/// is absent. Escaped text and CDATA sections are both accepted.
fn extract_element_text(document: &str, tag: &str) -> Result<Option<String>, AppError> {
    let mut reader = Reader::from_str(document);
    reader.config_mut().trim_text(true);

    let mut inside = false;
    let mut content = String::new();

    loop {
        match reader.read_event().map_err(decode_err)? {
            Event::Start(e) if e.name().as_ref() == tag.as_bytes() => {
                inside = true;
            }
            Event::End(e) if inside && e.name().as_ref() == tag.as_bytes() => {
                return Ok(Some(content));
            }
            Event::Text(t) if inside => {
                content.push_str(&t.unescape().map_err(decode_err)?);
            }
            Event::CData(t) if inside => {
                let raw = t.into_inner();
                content.push_str(&String::from_utf8_lossy(&raw));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn settings() -> GatewaySettings {
        GatewaySettings {
            url: "https://gateway.example.com/transfers".to_string(),
            access_code: "AC001".to_string(),
            username: "platform".to_string(),
            password: "s3cret".to_string(),
            channel: "API".to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    fn record() -> TransferRecord {
        TransferRecord {
            amount: dec!(123790.09),
            payment_date: NaiveDate::from_ymd_opt(2025, 1, 14).unwrap(),
            reference: "SB-7F2A3C1E9B04".to_string(),
            remarks: "settlement SB-7F2A3C1E9B04".to_string(),
            vendor_code: "ACME01".to_string(),
            beneficiary_name: "Acme Assurance".to_string(),
            account_number: "0123456789".to_string(),
            bank_code: "058".to_string(),
        }
    }

    #[test]
    fn request_carries_credentials_and_transfer_fields() {
        let xml = build_transfer_request(&settings(), &[record()]).unwrap();

        assert!(xml.starts_with("<BulkTransferRequest>"));
        assert!(xml.contains("<AccessCode>AC001</AccessCode>"));
        assert!(xml.contains("<Username>platform</Username>"));
        assert!(xml.contains("<Channel>API</Channel>"));
        assert!(xml.contains("<Amount>123790.09</Amount>"));
        assert!(xml.contains("<PaymentDate>2025-01-14</PaymentDate>"));
        assert!(xml.contains("<TransactionReference>SB-7F2A3C1E9B04</TransactionReference>"));
        assert!(xml.contains("<VendorCode>ACME01</VendorCode>"));
        assert!(xml.contains("<AccountNumber>0123456789</AccountNumber>"));
        assert!(xml.contains("<BankCode>058</BankCode>"));
        assert!(xml.ends_with("</BulkTransferRequest>"));
    }

    #[test]
    fn bulk_request_holds_one_transfer_element_per_record() {
        let mut second = record();
        second.reference = "SB-AA00BB11CC22".to_string();
        let xml = build_transfer_request(&settings(), &[record(), second]).unwrap();
        assert_eq!(xml.matches("<Transfer>").count(), 2);
        assert_eq!(xml.matches("</Transfer>").count(), 2);
    }

    #[test]
    fn amounts_are_rendered_with_two_decimals() {
        let mut r = record();
        r.amount = dec!(250);
        let xml = build_transfer_request(&settings(), &[r]).unwrap();
        assert!(xml.contains("<Amount>250.00</Amount>"));
    }

    #[test]
    fn reserved_characters_are_escaped() {
        let mut r = record();
        r.beneficiary_name = "Smith & Sons <Insurance>".to_string();
        let xml = build_transfer_request(&settings(), &[r]).unwrap();
        assert!(xml.contains("Smith &amp; Sons &lt;Insurance&gt;"));
    }

    #[test]
    fn parses_the_double_encoded_success_envelope() {
        let body = "<Response>&lt;TransferResponse&gt;\
            &lt;ResponseCode&gt;00&lt;/ResponseCode&gt;\
            &lt;ResponseDescription&gt;Approved&lt;/ResponseDescription&gt;\
            &lt;TransactionReference&gt;NIP-000045678&lt;/TransactionReference&gt;\
            &lt;/TransferResponse&gt;</Response>";

        let ack = parse_gateway_response(body).unwrap();
        assert!(ack.is_success());
        assert_eq!(ack.code, "00");
        assert_eq!(ack.description, "Approved");
        assert_eq!(ack.reference.as_deref(), Some("NIP-000045678"));
    }

    #[test]
    fn parses_a_cdata_wrapped_inner_document() {
        let body = "<Response><![CDATA[<TransferResponse>\
            <ResponseCode>91</ResponseCode>\
            <ResponseDescription>Insufficient float</ResponseDescription>\
            </TransferResponse>]]></Response>";

        let ack = parse_gateway_response(body).unwrap();
        assert!(!ack.is_success());
        assert_eq!(ack.code, "91");
        assert_eq!(ack.description, "Insufficient float");
        assert_eq!(ack.reference, None);
    }

    #[test]
    fn missing_envelope_is_a_protocol_error() {
        let err = parse_gateway_response("<Whatever>00</Whatever>").unwrap_err();
        assert!(matches!(err, AppError::Gateway(_)));
    }

    #[test]
    fn inner_document_without_a_code_is_a_protocol_error() {
        let body = "<Response>&lt;TransferResponse&gt;&lt;Foo&gt;x&lt;/Foo&gt;&lt;/TransferResponse&gt;</Response>";
        let err = parse_gateway_response(body).unwrap_err();
        assert!(matches!(err, AppError::Gateway(_)));
    }

    #[test]
    fn empty_envelope_is_a_protocol_error() {
        let err = parse_gateway_response("<Response></Response>").unwrap_err();
        assert!(matches!(err, AppError::Gateway(_)));
    }
}
