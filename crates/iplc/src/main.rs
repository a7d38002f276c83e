//! iplc: IP Location Changer
//!
//! Entry point. Parses arguments, sets up logging and runs one
//! connect or disconnect operation. The exit code reflects the outcome:
//! `0` success, `1` location not reached (or disconnect failed), `2` setup
//! failure (unreadable or invalid configuration) or launch failure.

use anyhow::Result;
use clap::{Parser, Subcommand};
use iplc_core::{ChangerConfig, CredentialsConfig, LocationChanger};
use iplc_vpn::{CountryConfigMap, VpnController};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Location not reached
const EXIT_NOT_REACHED: u8 = 1;
/// Configuration, setup or launch failure
const EXIT_SETUP_FAILED: u8 = 2;

// Use mimalloc as the global allocator
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(
    name = "iplc",
    version,
    about = "Change the host's apparent location through OpenVPN and verify it"
)]
struct Cli {
    /// Configuration file (.toml or .json)
    #[arg(short, long, global = true, default_value = "iplc.toml")]
    config: PathBuf,

    /// whatismyip.com API key
    #[arg(long, env = "IPLC_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// OpenVPN username
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// OpenVPN password
    #[arg(short, long, global = true)]
    password: Option<String>,

    /// Path to the openvpn executable
    #[arg(long, global = true)]
    openvpn: Option<String>,

    /// Retries after a failed location check
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    /// Seconds to wait between attempts
    #[arg(long, global = true)]
    backoff_secs: Option<u64>,

    /// Keep the VPN client running between attempts
    #[arg(long, global = true, default_value_t = false)]
    no_disconnect_between: bool,

    /// Verbose logging
    #[arg(short, long, global = true, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to a country and verify the new location
    Connect {
        /// Country as named in the configuration
        country: String,
    },
    /// Stop any running OpenVPN client
    Disconnect,
    /// Print a sample configuration file
    ExampleConfig {
        /// Print JSON instead of TOML
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

impl Cli {
    /// Apply command-line overrides on top of the file configuration
    fn apply_overrides(&self, config: &mut ChangerConfig) {
        if let Some(key) = &self.api_key {
            config.api_key = Some(key.clone());
        }
        if let Some(exe) = &self.openvpn {
            config.openvpn_executable = exe.clone();
        }
        if self.user.is_some() || self.password.is_some() {
            let current = config.credentials.take().unwrap_or(CredentialsConfig {
                username: String::new(),
                password: String::new(),
            });
            config.credentials = Some(CredentialsConfig {
                username: self.user.clone().unwrap_or(current.username),
                password: self.password.clone().unwrap_or(current.password),
            });
        }
        if let Some(retries) = self.max_retries {
            config.retry.max_retries = retries;
        }
        if let Some(secs) = self.backoff_secs {
            config.retry.backoff_secs = secs;
        }
        if self.no_disconnect_between {
            config.retry.disconnect_between_attempts = false;
        }
    }
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn connect(cli: &Cli, country: &str) -> u8 {
    let mut config = match ChangerConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load {}: {}", cli.config.display(), e);
            return EXIT_SETUP_FAILED;
        }
    };
    cli.apply_overrides(&mut config);

    let changer = match LocationChanger::from_config(&config) {
        Ok(changer) => changer,
        Err(e) => {
            eprintln!("{}", e);
            return EXIT_SETUP_FAILED;
        }
    };

    // Clear out any stale client first
    let stale = changer.disconnect_region().await;
    debug!("Stale client cleanup: {:?}", stale.message);

    let code = match changer.connect_region(country, 0).await {
        Ok(result) => {
            println!("{}", result.message);
            if result.success { 0 } else { EXIT_NOT_REACHED }
        }
        Err(e) => {
            eprintln!("{}{}", e.output(), e);
            EXIT_SETUP_FAILED
        }
    };

    changer.close();
    code
}

async fn disconnect(cli: &Cli) -> u8 {
    let executable = cli.openvpn.clone().unwrap_or_else(|| "openvpn".to_string());
    let vpn = VpnController::new(CountryConfigMap::new(), executable, None);

    let outcome = vpn.disconnect().await;
    print!("{}", outcome.output());

    if outcome.succeeded { 0 } else { EXIT_NOT_REACHED }
}

fn example_config(json: bool) -> Result<ExitCode> {
    let example = ChangerConfig::example();
    let rendered = if json { example.to_json()? } else { example.to_toml()? };
    println!("{}", rendered);
    Ok(ExitCode::SUCCESS)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    info!("iplc {} starting", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Command::Connect { country } => Ok(ExitCode::from(connect(&cli, country).await)),
        Command::Disconnect => Ok(ExitCode::from(disconnect(&cli).await)),
        Command::ExampleConfig { json } => example_config(*json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connect() {
        let cli = Cli::try_parse_from(["iplc", "connect", "DE", "-c", "my.json", "--debug"]).unwrap();

        assert!(matches!(cli.command, Command::Connect { ref country } if country == "DE"));
        assert_eq!(cli.config, PathBuf::from("my.json"));
        assert!(cli.debug);
    }

    #[test]
    fn test_parse_requires_command() {
        assert!(Cli::try_parse_from(["iplc"]).is_err());
        assert!(Cli::try_parse_from(["iplc", "connect"]).is_err());
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "iplc", "connect", "FR",
            "--api-key", "cli-key",
            "--user", "alice",
            "--openvpn", "/opt/openvpn",
            "--max-retries", "0",
            "--backoff-secs", "1",
            "--no-disconnect-between",
        ])
        .unwrap();

        let mut config = ChangerConfig::example();
        cli.apply_overrides(&mut config);

        assert_eq!(config.api_key.as_deref(), Some("cli-key"));
        assert_eq!(config.openvpn_executable, "/opt/openvpn");

        let creds = config.credentials.unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "REPLACE_WITH_VPN_PASSWORD");

        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.retry.backoff_secs, 1);
        assert!(!config.retry.disconnect_between_attempts);
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let cli = Cli::try_parse_from(["iplc", "disconnect"]).unwrap();

        let mut config = ChangerConfig::example();
        config.api_key = None;
        config.credentials = None;
        let before = config.clone();
        cli.apply_overrides(&mut config);

        // The key comes from IPLC_API_KEY when set, and is left alone otherwise
        assert_eq!(config.api_key, cli.api_key);
        config.api_key = None;
        assert_eq!(config, before);
    }

    #[tokio::test]
    async fn test_unreadable_config_is_setup_failure() {
        let dir = std::env::temp_dir().join("iplc-missing-config");
        let missing = dir.join("iplc.toml");
        let cli = Cli::try_parse_from(["iplc", "connect", "DE", "-c", missing.to_str().unwrap()])
            .unwrap();
        assert_eq!(connect(&cli, "DE").await, EXIT_SETUP_FAILED);

        let yaml = dir.join("iplc.yaml");
        let cli = Cli::try_parse_from(["iplc", "connect", "DE", "-c", yaml.to_str().unwrap()])
            .unwrap();
        assert_eq!(connect(&cli, "DE").await, EXIT_SETUP_FAILED);
    }
}
