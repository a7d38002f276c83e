//! Geolocation Client
//!
//! Queries whatismyip.com for the public IP address and its country,
//! and checks the country against the one a VPN connection should
//! have produced.

use crate::codes::ServiceErrorCode;
use crate::http::{HttpError, HttpGet, HttpsClient};
use crate::response::{GeoResponse, ParseError};
use tracing::{debug, info, warn};
use url::Url;

/// whatismyip.com API host
pub const DEFAULT_HOST: &str = "api.whatismyip.com";

/// Geolocation service errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("request to {0} failed")]
    RequestFailed(String),

    #[error("response is missing {0}")]
    MissingField(&'static str),

    #[error("{0}")]
    ErrorCode(ServiceErrorCode),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Parse(ParseError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<ParseError> for ServiceError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::Service(code) => ServiceError::ErrorCode(code),
            other => ServiceError::Parse(other),
        }
    }
}

/// Result of a connection check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    /// Does the apparent country match?
    pub success: bool,
    /// Diagnostic message
    pub message: String,
}

impl Validation {
    /// Matching country
    pub fn passed() -> Self {
        Self {
            success: true,
            message: "success".to_string(),
        }
    }

    /// Failed check with a message
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// whatismyip.com client
pub struct GeolocationClient<H = HttpsClient> {
    /// API key
    api_key: String,
    /// API host
    host: String,
    /// HTTP transport
    http: H,
}

impl GeolocationClient<HttpsClient> {
    /// Create a client using the default HTTPS transport
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_http(HttpsClient::with_defaults(), api_key)
    }
}

impl<H: HttpGet> GeolocationClient<H> {
    /// Create a client with a custom transport
    pub fn with_http(http: H, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            host: DEFAULT_HOST.to_string(),
            http,
        }
    }

    /// Use another API host
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Build the request URL for an endpoint
    pub fn endpoint_url(&self, path: &str, extra: &[(&str, &str)]) -> Result<Url, ServiceError> {
        let base = format!("https://{}/{}.php", self.host, path);
        let params = [("key", self.api_key.as_str()), ("output", "json")]
            .into_iter()
            .chain(extra.iter().copied());

        Ok(Url::parse_with_params(&base, params)?)
    }

    /// Query an endpoint and parse its response
    ///
    /// A 200 status does not guarantee a payload: the body may still be
    /// a service error code.
    pub async fn request(
        &self,
        path: &str,
        extra: &[(&str, &str)],
    ) -> Result<GeoResponse, ServiceError> {
        let url = self.endpoint_url(path, extra)?;
        debug!("GET {}.php {:?}", path, extra);

        let response = self.http.get(&url).await?;
        if !response.is_success() {
            warn!("{}.php returned {}", path, response.status);
            return Err(ServiceError::RequestFailed(path.to_string()));
        }

        Ok(GeoResponse::parse(&response.body)?)
    }

    /// Public IP address of this host
    pub async fn get_ip(&self) -> Result<String, ServiceError> {
        match self.request("ip", &[]).await {
            Ok(GeoResponse::Ip { ip }) => Ok(ip),
            Ok(_) | Err(ServiceError::Parse(ParseError::UnrecognizedShape)) => {
                Err(ServiceError::MissingField("ip_address"))
            }
            Err(e) => Err(e),
        }
    }

    /// Country code of `ip`
    pub async fn get_location_from_ip(&self, ip: &str) -> Result<String, ServiceError> {
        match self.request("ip-address-lookup", &[("input", ip)]).await {
            Ok(GeoResponse::Location { country_code }) => Ok(country_code),
            Ok(_) | Err(ServiceError::Parse(ParseError::UnrecognizedShape)) => {
                Err(ServiceError::MissingField("country"))
            }
            Err(e) => Err(e),
        }
    }

    /// Check that the host appears to be in `expected_country`
    pub async fn validate_connection(&self, expected_country: &str) -> Validation {
        let ip = match self.get_ip().await {
            Ok(ip) => ip,
            Err(e) => return Validation::failed(format!("could not obtain IP address: {}", e)),
        };
        debug!("Public IP: {}", ip);

        let actual = match self.get_location_from_ip(&ip).await {
            Ok(code) => code,
            Err(e) => return Validation::failed(format!("could not obtain location: {}", e)),
        };

        if actual.eq_ignore_ascii_case(expected_country) {
            info!("Location verified: {} ({})", actual, ip);
            Validation::passed()
        } else {
            warn!("Location mismatch: {} not {}", actual, expected_country);
            Validation::failed(format!("{} not {}", actual, expected_country))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;
    use async_trait::async_trait;
    use hyper::StatusCode;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Transport that replays queued responses and records URLs
    #[derive(Default)]
    struct FakeHttp {
        responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
        urls: Mutex<Vec<Url>>,
    }

    impl FakeHttp {
        fn reply(self, status: StatusCode, body: &str) -> Self {
            self.responses
                .lock()
                .unwrap()
                .push_back(Ok(HttpResponse::new(status, body)));
            self
        }

        fn fail(self, error: HttpError) -> Self {
            self.responses.lock().unwrap().push_back(Err(error));
            self
        }

        fn urls(&self) -> Vec<String> {
            self.urls.lock().unwrap().iter().map(Url::to_string).collect()
        }
    }

    #[async_trait]
    impl HttpGet for FakeHttp {
        async fn get(&self, url: &Url) -> Result<HttpResponse, HttpError> {
            self.urls.lock().unwrap().push(url.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(HttpError::ConnectionFailed("no response queued".into())))
        }
    }

    const IP_BODY: &str = r#"{"ip_address":"192.168.0.1"}"#;

    fn lookup_body(country: &str) -> String {
        format!(r#"{{"ip_address_lookup":[{{"status":"ok","ip":"192.168.0.1","country":"{}"}}]}}"#, country)
    }

    fn client(http: FakeHttp) -> GeolocationClient<FakeHttp> {
        GeolocationClient::with_http(http, "apikeyisthisstring")
    }

    #[tokio::test]
    async fn test_get_ip() {
        let geo = client(FakeHttp::default().reply(StatusCode::OK, IP_BODY));

        assert_eq!(geo.get_ip().await.unwrap(), "192.168.0.1");
        assert_eq!(
            geo.http.urls(),
            vec!["https://api.whatismyip.com/ip.php?key=apikeyisthisstring&output=json"]
        );
    }

    #[tokio::test]
    async fn test_get_location_from_ip() {
        let geo = client(FakeHttp::default().reply(StatusCode::OK, &lookup_body("DE")));

        assert_eq!(geo.get_location_from_ip("192.168.0.1").await.unwrap(), "DE");
        assert_eq!(
            geo.http.urls(),
            vec!["https://api.whatismyip.com/ip-address-lookup.php?key=apikeyisthisstring&output=json&input=192.168.0.1"]
        );
    }

    #[tokio::test]
    async fn test_request_failed_status() {
        let geo = client(FakeHttp::default().reply(StatusCode::SERVICE_UNAVAILABLE, IP_BODY));

        let err = geo.get_ip().await.unwrap_err();
        assert!(matches!(err, ServiceError::RequestFailed(ref p) if p == "ip"));
    }

    #[tokio::test]
    async fn test_error_code_with_ok_status() {
        let geo = client(FakeHttp::default().reply(StatusCode::OK, "3"));

        let err = geo.get_ip().await.unwrap_err();
        assert!(matches!(err, ServiceError::ErrorCode(ServiceErrorCode::TooManyLookups)));
        assert_eq!(err.to_string(), "Too many lookups");
    }

    #[tokio::test]
    async fn test_missing_fields() {
        let geo = client(
            FakeHttp::default()
                .reply(StatusCode::OK, &lookup_body("DE"))
                .reply(StatusCode::OK, "{}"),
        );

        assert!(matches!(geo.get_ip().await, Err(ServiceError::MissingField("ip_address"))));
        assert!(matches!(
            geo.get_location_from_ip("1.2.3.4").await,
            Err(ServiceError::MissingField("country"))
        ));
    }

    #[tokio::test]
    async fn test_validate_success_case_insensitive() {
        let geo = client(
            FakeHttp::default()
                .reply(StatusCode::OK, IP_BODY)
                .reply(StatusCode::OK, &lookup_body("DE")),
        );

        assert_eq!(geo.validate_connection("de").await, Validation::passed());
        assert_eq!(geo.http.urls().len(), 2);
    }

    #[tokio::test]
    async fn test_validate_ip_failure() {
        let geo = client(FakeHttp::default().fail(HttpError::ConnectionFailed("error occurred".into())));

        let result = geo.validate_connection("de").await;
        assert_eq!(
            result,
            Validation::failed("could not obtain IP address: Connection failed: error occurred")
        );
        assert_eq!(geo.http.urls().len(), 1);
    }

    #[tokio::test]
    async fn test_validate_location_failure() {
        let geo = client(
            FakeHttp::default()
                .reply(StatusCode::OK, IP_BODY)
                .fail(HttpError::ConnectionFailed("service error".into())),
        );

        let result = geo.validate_connection("de").await;
        assert_eq!(
            result,
            Validation::failed("could not obtain location: Connection failed: service error")
        );
    }

    #[tokio::test]
    async fn test_validate_country_mismatch() {
        let geo = client(
            FakeHttp::default()
                .reply(StatusCode::OK, IP_BODY)
                .reply(StatusCode::OK, &lookup_body("FR")),
        );

        let result = geo.validate_connection("DE").await;
        assert_eq!(result, Validation::failed("FR not DE"));
    }

    #[tokio::test]
    async fn test_validate_service_code() {
        let geo = client(FakeHttp::default().reply(StatusCode::OK, "1"));

        let result = geo.validate_connection("DE").await;
        assert_eq!(
            result,
            Validation::failed("could not obtain IP address: API key is invalid")
        );
    }

    #[test]
    fn test_custom_host() {
        let geo = client(FakeHttp::default()).with_host("geo.internal");
        let url = geo.endpoint_url("ip", &[]).unwrap();
        assert_eq!(url.host_str(), Some("geo.internal"));
    }
}
