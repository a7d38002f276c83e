//! Orchestrator errors
//!
//! Subsystem errors never leave the orchestrator as-is: they are wrapped
//! in a [`ChangerError`] tagged with the stage that failed.

use crate::config::ConfigError;
use iplc_geo::ServiceError;
use iplc_vpn::VpnError;
use std::fmt;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Building the changer (config, credentials)
    Setup,
    /// Launching the VPN client
    Connect,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Setup => write!(f, "setup"),
            Stage::Connect => write!(f, "connect"),
        }
    }
}

/// Error raised by one of the subsystems
#[derive(Debug, thiserror::Error)]
pub enum SubsystemError {
    #[error(transparent)]
    Vpn(#[from] VpnError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("credentials: {0}")]
    Credentials(#[from] std::io::Error),
}

/// Structural failure of a location change
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {source}")]
pub struct ChangerError {
    /// Stage that failed
    pub stage: Stage,
    /// Underlying error
    pub source: SubsystemError,
}

impl ChangerError {
    /// Wrap a subsystem error
    pub fn new(stage: Stage, source: impl Into<SubsystemError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }

    /// Process output captured before the failure, if any
    pub fn output(&self) -> String {
        match &self.source {
            SubsystemError::Vpn(e) => e.output(),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ChangerError::new(
            Stage::Connect,
            VpnError::UnknownCountry { country: "atlantis".into() },
        );
        assert_eq!(err.to_string(), "connect failed: no config for specified country");
        assert_eq!(err.output(), "");
    }

    #[test]
    fn test_output_from_vpn() {
        let err = ChangerError::new(
            Stage::Connect,
            VpnError::ConnectFailed {
                reason: "sudo exited with status 1".into(),
                stdout: "config invalid\n".into(),
                stderr: "config file invalid\n".into(),
            },
        );
        assert_eq!(err.output(), "config invalid\nconfig file invalid\n");
        assert!(std::error::Error::source(&err).is_some());
    }
}
