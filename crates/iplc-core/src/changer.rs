//! Location Changer
//!
//! Drives one "change region and verify" operation:
//!
//! 1. Launch the VPN client for the country (structural failures abort)
//! 2. Ask the geolocation service where the host now appears to be
//! 3. Merge the diagnostics of both steps into one message
//! 4. Retry failed verifications according to the [`RetryPolicy`]
//!
//! Attempts are strictly sequential. The changer assumes it owns the
//! only VPN client slot on the host.

use crate::config::ChangerConfig;
use crate::error::{ChangerError, Stage};
use async_trait::async_trait;
use iplc_geo::{GeolocationClient, HttpGet, HttpsClient, Validation};
use iplc_vpn::{CredentialScope, ProcessOutcome, Shell, SystemShell, VpnController, VpnError};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Something that can move the host into a country
#[async_trait]
pub trait Tunnel: Send + Sync {
    /// Bring the tunnel up for `country`
    async fn connect(&self, country: &str) -> Result<ProcessOutcome, VpnError>;

    /// Tear down any running tunnel
    async fn disconnect(&self) -> ProcessOutcome;
}

#[async_trait]
impl<S: Shell> Tunnel for VpnController<S> {
    async fn connect(&self, country: &str) -> Result<ProcessOutcome, VpnError> {
        VpnController::connect(self, country).await
    }

    async fn disconnect(&self) -> ProcessOutcome {
        VpnController::disconnect(self).await
    }
}

/// Something that can tell whether the host appears in a country
#[async_trait]
pub trait LocationProbe: Send + Sync {
    /// Check the apparent location against `expected_country`
    async fn validate_connection(&self, expected_country: &str) -> Validation;
}

#[async_trait]
impl<H: HttpGet> LocationProbe for GeolocationClient<H> {
    async fn validate_connection(&self, expected_country: &str) -> Validation {
        GeolocationClient::validate_connection(self, expected_country).await
    }
}

/// Retry behavior for failed verifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Wait between attempts
    pub backoff: Duration,
    /// Kill the VPN client before retrying
    pub disconnect_between_attempts: bool,
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
            disconnect_between_attempts: false,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_secs(5),
            disconnect_between_attempts: true,
        }
    }
}

/// Final outcome of a region change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionResult {
    /// Both the VPN client and the location check succeeded
    pub success: bool,
    /// VPN output followed by the location diagnostics
    pub message: String,
}

impl ConnectionResult {
    /// Create a result
    pub fn new(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            message: message.into(),
        }
    }
}

impl fmt::Display for ConnectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Location changer
///
/// Owns the VPN tunnel, the location probe and (optionally) the
/// credentials file for as long as it lives.
pub struct LocationChanger<T = VpnController<SystemShell>, P = GeolocationClient<HttpsClient>> {
    /// VPN side
    tunnel: T,
    /// Geolocation side
    probe: P,
    /// Retry policy
    policy: RetryPolicy,
    /// Credentials file used by the tunnel
    credentials: Option<CredentialScope>,
}

impl LocationChanger {
    /// Build a changer for this host from configuration
    ///
    /// Writes the credentials file (if any) and keeps it until the
    /// changer is closed or dropped.
    pub fn from_config(config: &ChangerConfig) -> Result<Self, ChangerError> {
        config
            .validate()
            .map_err(|e| ChangerError::new(Stage::Setup, e))?;

        let credentials = config
            .credentials
            .as_ref()
            .map(|c| CredentialScope::new(&c.username, &c.password))
            .transpose()
            .map_err(|e| ChangerError::new(Stage::Setup, e))?;

        let tunnel = VpnController::new(
            config.countries.clone(),
            config.openvpn_executable.as_str(),
            credentials.as_ref().map(|c| c.path().to_path_buf()),
        );
        let probe = GeolocationClient::new(config.api_key.clone().unwrap_or_default());

        info!(
            "Location changer ready ({} countries, credentials: {})",
            config.countries.len(),
            credentials.is_some()
        );

        Ok(Self::new(tunnel, probe, config.retry_policy()).with_credentials(credentials))
    }
}

impl<T: Tunnel, P: LocationProbe> LocationChanger<T, P> {
    /// Create a changer from its parts
    pub fn new(tunnel: T, probe: P, policy: RetryPolicy) -> Self {
        Self {
            tunnel,
            probe,
            policy,
            credentials: None,
        }
    }

    /// Hand over a credentials scope to keep alive
    pub fn with_credentials(mut self, credentials: Option<CredentialScope>) -> Self {
        self.credentials = credentials;
        self
    }

    /// VPN side
    pub fn tunnel(&self) -> &T {
        &self.tunnel
    }

    /// Geolocation side
    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Retry policy
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Change the apparent location to `country` and verify it
    ///
    /// `attempt` is the attempt to start counting from (0 for a fresh
    /// call). Failed verifications are retried until `max_retries` is
    /// reached; the last result is returned either way. Unknown
    /// countries and failed launches are errors and are not retried.
    pub async fn connect_region(
        &self,
        country: &str,
        attempt: u32,
    ) -> Result<ConnectionResult, ChangerError> {
        let mut attempt = attempt;

        loop {
            info!(
                "Changing location to {} (attempt {}/{})",
                country,
                attempt.saturating_add(1),
                self.policy.max_retries.saturating_add(1)
            );

            let result = self.attempt(country).await?;
            if result.success {
                info!("Location changed to {}", country);
                return Ok(result);
            }
            if attempt >= self.policy.max_retries {
                warn!(
                    "Giving up on {} after {} attempts",
                    country,
                    attempt.saturating_add(1)
                );
                return Ok(result);
            }

            warn!(
                "Location check failed, retrying in {:?}: {}",
                self.policy.backoff, result.message
            );

            if self.policy.disconnect_between_attempts {
                let outcome = self.tunnel.disconnect().await;
                debug!("Disconnect before retry: {:?}", outcome.output());
            }
            if !self.policy.backoff.is_zero() {
                tokio::time::sleep(self.policy.backoff).await;
            }

            attempt += 1;
        }
    }

    /// One connect + verify pass
    async fn attempt(&self, country: &str) -> Result<ConnectionResult, ChangerError> {
        let outcome = self
            .tunnel
            .connect(country)
            .await
            .map_err(|e| ChangerError::new(Stage::Connect, e))?;

        let validation = self.probe.validate_connection(country).await;

        let message = format!("{}{}{}", outcome.stdout, outcome.stderr, validation.message);
        Ok(ConnectionResult::new(
            outcome.succeeded && validation.success,
            message,
        ))
    }

    /// Stop the VPN client
    pub async fn disconnect_region(&self) -> ConnectionResult {
        let outcome = self.tunnel.disconnect().await;
        ConnectionResult::new(outcome.succeeded, outcome.output())
    }

    /// Release the credentials file now
    pub fn close(mut self) {
        if let Some(scope) = self.credentials.take() {
            scope.close();
        }
    }
}
