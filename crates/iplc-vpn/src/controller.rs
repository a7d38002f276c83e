//! VPN Controller
//!
//! Maps a country to an OpenVPN configuration file and drives the
//! `openvpn` daemon through a [`Shell`].
//!
//! # Commands
//!
//! | Operation | Command | Mode |
//! |-----------|---------|------|
//! | connect | `sudo <exe> --auth-retry nointeract --config <path> --script-security 2 --daemon <name> [--auth-user-pass <cred>]` | checked |
//! | disconnect | `sudo killall openvpn` | tolerant |

use crate::shell::{CommandLine, ExecMode, ProcessOutcome, Shell, ShellError, SystemShell};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Name the OpenVPN daemon runs under
pub const DAEMON_NAME: &str = "openvpn_iplocationchanger";

/// Country identifier → OpenVPN config file
pub type CountryConfigMap = BTreeMap<String, PathBuf>;

/// VPN controller errors
#[derive(Debug, thiserror::Error)]
pub enum VpnError {
    #[error("no config for specified country")]
    UnknownCountry { country: String },

    #[error("openvpn connect failed: {reason}")]
    ConnectFailed {
        reason: String,
        stdout: String,
        stderr: String,
    },
}

impl VpnError {
    /// Output the process produced before failing (empty if none ran)
    pub fn output(&self) -> String {
        match self {
            VpnError::UnknownCountry { .. } => String::new(),
            VpnError::ConnectFailed { stdout, stderr, .. } => format!("{}{}", stdout, stderr),
        }
    }
}

impl From<ShellError> for VpnError {
    fn from(e: ShellError) -> Self {
        let reason = e.to_string();
        match e {
            ShellError::NonZeroExit { stdout, stderr, .. } => VpnError::ConnectFailed {
                reason,
                stdout,
                stderr,
            },
            ShellError::Spawn { .. } => VpnError::ConnectFailed {
                reason,
                stdout: String::new(),
                stderr: String::new(),
            },
        }
    }
}

/// OpenVPN process controller
///
/// Holds the country map, the `openvpn` executable and the optional
/// credentials file. Only one daemon is ever managed at a time.
pub struct VpnController<S = SystemShell> {
    /// Country → config file
    countries: CountryConfigMap,
    /// Path to the `openvpn` executable
    executable: String,
    /// Credentials file for `--auth-user-pass`
    credentials_path: Option<PathBuf>,
    /// Command runner
    shell: S,
}

impl VpnController<SystemShell> {
    /// Create a controller that runs commands on this host
    pub fn new(
        countries: CountryConfigMap,
        executable: impl Into<String>,
        credentials_path: Option<PathBuf>,
    ) -> Self {
        Self::with_shell(SystemShell, countries, executable, credentials_path)
    }
}

impl<S: Shell> VpnController<S> {
    /// Create a controller with a custom shell
    pub fn with_shell(
        shell: S,
        countries: CountryConfigMap,
        executable: impl Into<String>,
        credentials_path: Option<PathBuf>,
    ) -> Self {
        Self {
            countries,
            executable: executable.into(),
            credentials_path,
            shell,
        }
    }

    /// Is a non-empty credentials path configured?
    pub fn has_credentials(&self) -> bool {
        self.credentials_path
            .as_ref()
            .is_some_and(|p| !p.as_os_str().is_empty())
    }

    /// Countries with a configuration
    pub fn countries(&self) -> impl Iterator<Item = &str> {
        self.countries.keys().map(String::as_str)
    }

    /// Command used to stop any running OpenVPN client
    pub fn disconnect_command(&self) -> CommandLine {
        CommandLine::new("sudo").args(["killall", "openvpn"])
    }

    /// Command used to connect to `country`
    pub fn connect_command(&self, country: &str) -> Result<CommandLine, VpnError> {
        let config = self
            .countries
            .get(country)
            .ok_or_else(|| VpnError::UnknownCountry {
                country: country.to_string(),
            })?;

        let mut cmd = CommandLine::new("sudo")
            .arg(self.executable.as_str())
            .args(["--auth-retry", "nointeract"])
            .arg("--config")
            .arg(config.to_string_lossy())
            .args(["--script-security", "2"])
            .args(["--daemon", DAEMON_NAME]);

        if let Some(path) = self.credentials_path.as_ref().filter(|_| self.has_credentials()) {
            cmd = cmd.arg("--auth-user-pass").arg(path.to_string_lossy());
        }

        Ok(cmd)
    }

    /// Stop any running OpenVPN client
    ///
    /// A non-zero exit (nothing to kill) is a normal outcome. If the
    /// command cannot be run at all the outcome is unsuccessful with the
    /// error text as stderr.
    pub async fn disconnect(&self) -> ProcessOutcome {
        let cmd = self.disconnect_command();
        info!("Disconnecting OpenVPN");

        match self.shell.run(&cmd, ExecMode::Tolerant).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Disconnect command failed: {}", e);
                ProcessOutcome::failure("", e.to_string())
            }
        }
    }

    /// Launch the OpenVPN daemon for `country`
    pub async fn connect(&self, country: &str) -> Result<ProcessOutcome, VpnError> {
        let cmd = self.connect_command(country)?;
        info!("Connecting OpenVPN for {}", country);
        debug!("Connect command: {}", cmd);

        let outcome = self.shell.run(&cmd, ExecMode::Checked).await?;
        info!("OpenVPN daemon started for {}", country);
        Ok(outcome)
    }
}
