//! Service error codes returned by whatismyip.com in place of a payload.

use std::fmt;

/// Single-digit API error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceErrorCode {
    KeyNotEntered,
    KeyInvalid,
    KeyInactive,
    TooManyLookups,
    NoInput,
    InvalidInput,
    Unknown,
}

impl ServiceErrorCode {
    /// All codes, in numeric order
    pub fn all() -> &'static [ServiceErrorCode] {
        &[
            ServiceErrorCode::KeyNotEntered,
            ServiceErrorCode::KeyInvalid,
            ServiceErrorCode::KeyInactive,
            ServiceErrorCode::TooManyLookups,
            ServiceErrorCode::NoInput,
            ServiceErrorCode::InvalidInput,
            ServiceErrorCode::Unknown,
        ]
    }

    /// Numeric code
    pub fn code(&self) -> u8 {
        match self {
            ServiceErrorCode::KeyNotEntered => 0,
            ServiceErrorCode::KeyInvalid => 1,
            ServiceErrorCode::KeyInactive => 2,
            ServiceErrorCode::TooManyLookups => 3,
            ServiceErrorCode::NoInput => 4,
            ServiceErrorCode::InvalidInput => 5,
            ServiceErrorCode::Unknown => 6,
        }
    }

    /// Code from its numeric value
    pub fn from_code(code: u8) -> Option<Self> {
        Self::all().get(code as usize).copied()
    }

    /// Human-readable meaning
    pub fn meaning(&self) -> &'static str {
        match self {
            ServiceErrorCode::KeyNotEntered => "API key was not entered",
            ServiceErrorCode::KeyInvalid => "API key is invalid",
            ServiceErrorCode::KeyInactive => "API key is inactive",
            ServiceErrorCode::TooManyLookups => "Too many lookups",
            ServiceErrorCode::NoInput => "No input",
            ServiceErrorCode::InvalidInput => "Invalid input",
            ServiceErrorCode::Unknown => "Unknown error",
        }
    }

    /// Detect a code in a raw response body
    ///
    /// The body must be exactly one digit 0-6 after trimming and
    /// lowercasing.
    pub fn from_body(body: &str) -> Option<Self> {
        match body.trim().to_lowercase().as_str() {
            "0" => Some(ServiceErrorCode::KeyNotEntered),
            "1" => Some(ServiceErrorCode::KeyInvalid),
            "2" => Some(ServiceErrorCode::KeyInactive),
            "3" => Some(ServiceErrorCode::TooManyLookups),
            "4" => Some(ServiceErrorCode::NoInput),
            "5" => Some(ServiceErrorCode::InvalidInput),
            "6" => Some(ServiceErrorCode::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.meaning())
    }
}
