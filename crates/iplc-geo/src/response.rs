//! Response parsing for whatismyip.com bodies.
//!
//! A body is, in order of precedence:
//! 1. a service error code (`"0"`..`"6"`)
//! 2. `{"ip_address": "<ip>"}` (any document with this key; a non-string
//!    value is unrecognized)
//! 3. `{"ip_address_lookup": [{"country": "<code>", ...}]}`
//!
//! Anything else is a [`ParseError`].

use crate::codes::ServiceErrorCode;
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Parsed service response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeoResponse {
    /// Answer to `ip.php`
    Ip { ip: String },
    /// Answer to `ip-address-lookup.php`
    Location { country_code: String },
}

/// Response parse errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("{0}")]
    Service(ServiceErrorCode),

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Could not identify response type")]
    UnrecognizedShape,
}

impl GeoResponse {
    /// Parse a raw response body
    pub fn parse(body: &[u8]) -> Result<Self, ParseError> {
        if let Some(code) = ServiceErrorCode::from_body(&String::from_utf8_lossy(body)) {
            return Err(ParseError::Service(code));
        }

        let doc: Value =
            serde_json::from_slice(body).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
        debug!("Response document: {}", doc);

        let response = Self::from_document(&doc)?;
        debug!("Response type: {}", response);
        Ok(response)
    }

    fn from_document(doc: &Value) -> Result<Self, ParseError> {
        // The key alone marks an IP response; its value must be a string
        if let Some(ip) = doc.get("ip_address") {
            return match ip.as_str() {
                Some(ip) => Ok(GeoResponse::Ip { ip: ip.to_string() }),
                None => Err(ParseError::UnrecognizedShape),
            };
        }

        let country = doc
            .get("ip_address_lookup")
            .and_then(|lookup| lookup.get(0))
            .and_then(|entry| entry.get("country"))
            .and_then(Value::as_str);

        match country {
            Some(code) => Ok(GeoResponse::Location {
                country_code: code.to_string(),
            }),
            None => Err(ParseError::UnrecognizedShape),
        }
    }
}

impl fmt::Display for GeoResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeoResponse::Ip { ip } => write!(f, "ip({})", ip),
            GeoResponse::Location { country_code } => write!(f, "location({})", country_code),
        }
    }
}
