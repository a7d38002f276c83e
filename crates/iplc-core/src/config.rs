//! Changer Configuration
//!
//! Loaded once per invocation from a TOML or JSON file:
//!
//! ```toml
//! openvpn_executable = "/usr/sbin/openvpn"
//! api_key = "..."
//!
//! [credentials]
//! username = "user"
//! password = "secret"
//!
//! [countries]
//! DE = "/etc/openvpn/de.ovpn"
//! FR = "/etc/openvpn/fr.ovpn"
//!
//! [retry]
//! max_retries = 2
//! backoff_secs = 5
//! disconnect_between_attempts = true
//! ```

use crate::changer::RetryPolicy;
use iplc_vpn::CountryConfigMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Configuration format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("").to_string())),
        }
    }
}

/// OpenVPN login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub username: String,
    pub password: String,
}

/// Retry settings as written in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Wait between attempts (seconds)
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
    /// Kill the VPN client before retrying
    #[serde(default = "default_true")]
    pub disconnect_between_attempts: bool,
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_secs: default_backoff_secs(),
            disconnect_between_attempts: default_true(),
        }
    }
}

impl From<RetrySettings> for RetryPolicy {
    fn from(s: RetrySettings) -> Self {
        RetryPolicy {
            max_retries: s.max_retries,
            backoff: Duration::from_secs(s.backoff_secs),
            disconnect_between_attempts: s.disconnect_between_attempts,
        }
    }
}

/// Complete changer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangerConfig {
    /// Path to the `openvpn` executable
    #[serde(default = "default_executable")]
    pub openvpn_executable: String,
    /// whatismyip.com API key
    #[serde(default)]
    pub api_key: Option<String>,
    /// OpenVPN login (omit for certificate-only configs)
    #[serde(default)]
    pub credentials: Option<CredentialsConfig>,
    /// Country → OpenVPN config file
    pub countries: CountryConfigMap,
    /// Retry policy
    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_executable() -> String {
    "openvpn".to_string()
}

impl ChangerConfig {
    /// Load from a `.toml` or `.json` file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;

        let config = Self::from_content(&content, format)?;
        info!(
            "Loaded config from {} with {} countries",
            path.display(),
            config.countries.len()
        );
        Ok(config)
    }

    /// Load from a string
    pub fn from_content(content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        match format {
            ConfigFormat::Toml => {
                toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
        }
    }

    /// Sample configuration with placeholder values
    pub fn example() -> Self {
        let mut countries = CountryConfigMap::new();
        countries.insert("DE".to_string(), "/etc/openvpn/client/de.ovpn".into());
        countries.insert("FR".to_string(), "/etc/openvpn/client/fr.ovpn".into());
        countries.insert("US".to_string(), "/etc/openvpn/client/us.ovpn".into());

        Self {
            openvpn_executable: "/usr/sbin/openvpn".to_string(),
            api_key: Some("REPLACE_WITH_YOUR_WHATISMYIP_API_KEY".to_string()),
            credentials: Some(CredentialsConfig {
                username: "REPLACE_WITH_VPN_USERNAME".to_string(),
                password: "REPLACE_WITH_VPN_PASSWORD".to_string(),
            }),
            countries,
            retry: RetrySettings::default(),
        }
    }

    /// Export as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Export as JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Retry policy
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.into()
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.countries.is_empty() {
            return Err(ConfigError::NoCountries);
        }
        if self.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported config format: {0:?}")]
    UnsupportedFormat(String),

    #[error("No countries configured")]
    NoCountries,

    #[error("No whatismyip.com API key configured")]
    MissingApiKey,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const TOML_CONFIG: &str = r#"
        api_key = "abc"

        [countries]
        DE = "/etc/openvpn/de.ovpn"
        "sample country" = "/etc/openvpn/sample.ovpn"
    "#;

    #[test]
    fn test_toml_defaults() {
        let config = ChangerConfig::from_content(TOML_CONFIG, ConfigFormat::Toml).unwrap();

        assert_eq!(config.openvpn_executable, "openvpn");
        assert_eq!(config.api_key.as_deref(), Some("abc"));
        assert!(config.credentials.is_none());
        assert_eq!(config.countries.len(), 2);
        assert_eq!(
            config.countries.get("sample country"),
            Some(&PathBuf::from("/etc/openvpn/sample.ovpn"))
        );
        assert_eq!(config.retry, RetrySettings::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_config() {
        let json = r#"{
            "openvpn_executable": "/usr/sbin/openvpn",
            "credentials": {"username": "user", "password": "pass"},
            "countries": {"FR": "/etc/openvpn/fr.ovpn"},
            "retry": {"max_retries": 0, "backoff_secs": 1}
        }"#;
        let config = ChangerConfig::from_content(json, ConfigFormat::Json).unwrap();

        assert_eq!(config.openvpn_executable, "/usr/sbin/openvpn");
        assert_eq!(config.credentials.as_ref().unwrap().username, "user");

        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.backoff, Duration::from_secs(1));
        assert!(policy.disconnect_between_attempts);

        assert!(matches!(config.validate(), Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn test_validate_no_countries() {
        let config = ChangerConfig::from_content("api_key = \"k\"\n[countries]\n", ConfigFormat::Toml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::NoCountries)));
    }

    #[test]
    fn test_parse_error() {
        let result = ChangerConfig::from_content("not = [valid", ConfigFormat::Toml);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_example_roundtrip() {
        let config = ChangerConfig::example();

        let toml = config.to_toml().unwrap();
        assert_eq!(ChangerConfig::from_content(&toml, ConfigFormat::Toml).unwrap(), config);

        let json = config.to_json().unwrap();
        assert_eq!(ChangerConfig::from_content(&json, ConfigFormat::Json).unwrap(), config);
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("iplc.toml");
        std::fs::write(&toml_path, TOML_CONFIG).unwrap();
        assert_eq!(ChangerConfig::load(&toml_path).unwrap().countries.len(), 2);

        let json_path = dir.path().join("iplc.json");
        std::fs::write(&json_path, ChangerConfig::example().to_json().unwrap()).unwrap();
        assert_eq!(ChangerConfig::load(&json_path).unwrap().countries.len(), 3);

        let yaml_path = dir.path().join("iplc.yaml");
        std::fs::write(&yaml_path, "countries: {}").unwrap();
        assert!(matches!(
            ChangerConfig::load(&yaml_path),
            Err(ConfigError::UnsupportedFormat(ext)) if ext == "yaml"
        ));

        assert!(matches!(
            ChangerConfig::load(&dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
