//! iplc Core - Location Change Orchestration
//!
//! Composes the OpenVPN controller and the geolocation client into a
//! single "change region and verify" operation.
//!
//! # Usage
//!
//! ```rust,ignore
//! let config = ChangerConfig::load(Path::new("iplc.toml"))?;
//! let changer = LocationChanger::from_config(&config)?;
//!
//! let result = changer.connect_region("DE", 0).await?;
//! println!("{}", result.message);
//!
//! changer.disconnect_region().await;
//! changer.close();
//! ```

mod config;
mod error;
mod changer;

pub use config::{ChangerConfig, ConfigError, ConfigFormat, CredentialsConfig, RetrySettings};
pub use error::{ChangerError, Stage, SubsystemError};
pub use changer::{ConnectionResult, LocationChanger, LocationProbe, RetryPolicy, Tunnel};
