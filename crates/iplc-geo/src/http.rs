//! HTTPS GET Client
//!
//! Uses hyper over tokio with rustls for TLS.
//! Features:
//! - One connection per request (the service is queried twice per check)
//! - Overall request timeout and response size limit
//! - [`HttpGet`] trait so the geolocation client can run against fakes

use async_trait::async_trait;
use http_body_util::{BodyExt, Empty, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::header::{ACCEPT, HOST, USER_AGENT};
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use rustls::ClientConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};
use url::Url;

/// HTTP client errors
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("TLS error: {0}")]
    TlsError(String),

    #[error("Body read error: {0}")]
    BodyError(String),
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Whole-request timeout
    pub timeout: Duration,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// User-Agent string
    pub user_agent: String,
    /// Maximum response body size
    pub max_body_size: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("iplc/{}", env!("CARGO_PKG_VERSION")),
            max_body_size: 64 * 1024, // 64 KB, answers are tiny
        }
    }
}

/// HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code
    pub status: StatusCode,
    /// Response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create a response
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Check if response was successful (2xx)
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Capability to perform a GET request
#[async_trait]
pub trait HttpGet: Send + Sync {
    /// GET `url` and return status + body
    async fn get(&self, url: &Url) -> Result<HttpResponse, HttpError>;
}

/// HTTPS client backed by hyper + rustls
pub struct HttpsClient {
    /// Configuration
    config: HttpClientConfig,
    /// TLS configuration (shared between requests)
    tls: Arc<ClientConfig>,
}

impl HttpsClient {
    /// Create a new HTTP client
    pub fn new(config: HttpClientConfig) -> Self {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let tls = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        info!("HTTP client initialized (timeout: {:?})", config.timeout);

        Self {
            config,
            tls: Arc::new(tls),
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(HttpClientConfig::default())
    }

    async fn fetch(&self, url: &Url) -> Result<HttpResponse, HttpError> {
        let start = Instant::now();

        let host = url
            .host_str()
            .ok_or_else(|| HttpError::InvalidUrl("No host in URL".to_string()))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| HttpError::InvalidUrl("No port for scheme".to_string()))?;
        let is_https = match url.scheme() {
            "https" => true,
            "http" => false,
            other => return Err(HttpError::InvalidUrl(format!("Unsupported scheme: {}", other))),
        };

        let request = Request::builder()
            .method(Method::GET)
            .uri(&url[url::Position::BeforePath..])
            .header(HOST, host)
            .header(USER_AGENT, &self.config.user_agent)
            .header(ACCEPT, "application/json")
            .body(Empty::<Bytes>::new())
            .map_err(|e| HttpError::HttpError(e.to_string()))?;

        let addr = format!("{}:{}", host, port);
        let stream = tokio::time::timeout(
            self.config.connect_timeout,
            tokio::net::TcpStream::connect(&addr),
        )
        .await
        .map_err(|_| HttpError::Timeout)?
        .map_err(|e| HttpError::ConnectionFailed(e.to_string()))?;

        let response = if is_https {
            let connector = TlsConnector::from(self.tls.clone());
            let server_name = rustls::pki_types::ServerName::try_from(host.to_string())
                .map_err(|_| HttpError::TlsError("Invalid server name".to_string()))?;

            let tls_stream = connector
                .connect(server_name, stream)
                .await
                .map_err(|e| HttpError::TlsError(e.to_string()))?;

            send_request(tls_stream, request).await?
        } else {
            send_request(stream, request).await?
        };

        let status = response.status();
        let body = Limited::new(response.into_body(), self.config.max_body_size)
            .collect()
            .await
            .map_err(|e| HttpError::BodyError(e.to_string()))?
            .to_bytes()
            .to_vec();

        debug!(
            "HTTP GET {}{} -> {} ({} bytes, {:?})",
            host,
            url.path(),
            status,
            body.len(),
            start.elapsed()
        );

        Ok(HttpResponse { status, body })
    }
}

/// Run an HTTP/1.1 exchange over an established stream
async fn send_request<T>(
    stream: T,
    request: Request<Empty<Bytes>>,
) -> Result<hyper::Response<Incoming>, HttpError>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| HttpError::HttpError(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            warn!("Connection error: {}", e);
        }
    });

    sender
        .send_request(request)
        .await
        .map_err(|e| HttpError::HttpError(e.to_string()))
}

#[async_trait]
impl HttpGet for HttpsClient {
    async fn get(&self, url: &Url) -> Result<HttpResponse, HttpError> {
        tokio::time::timeout(self.config.timeout, self.fetch(url))
            .await
            .map_err(|_| HttpError::Timeout)?
    }
}
