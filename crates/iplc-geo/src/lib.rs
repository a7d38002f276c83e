//! iplc Geolocation
//!
//! Verifies where the host appears to be on the internet using the
//! whatismyip.com API.
//!
//! Flow:
//! 1. `ip.php` → public IP address
//! 2. `ip-address-lookup.php?input=<ip>` → country code
//! 3. Country code compared (case-insensitive) with the expected one
//!
//! Every response body is first checked for a single-digit service
//! error code before it is parsed as JSON.

mod codes;
mod response;
mod http;
mod client;

pub use codes::ServiceErrorCode;
pub use response::{GeoResponse, ParseError};
pub use http::{HttpClientConfig, HttpError, HttpGet, HttpResponse, HttpsClient};
pub use client::{GeolocationClient, ServiceError, Validation, DEFAULT_HOST};
