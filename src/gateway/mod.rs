//! Bank gateway protocol client.
//!
//! The external interbank gateway speaks XML over HTTP: one outbound document
//! carrying credentials and transfer records, and a response envelope whose
//! payload is a second XML document nested as text inside the first (a quirk
//! of the external protocol, preserved exactly for compatibility).

/// HTTP transport to the bank gateway
pub mod client;
/// XML encoding/decoding of the wire protocol
pub mod protocol;
