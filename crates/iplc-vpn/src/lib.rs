//! iplc VPN - OpenVPN Process Control
//!
//! Drives the system OpenVPN client to move the host into another
//! country. The crate owns three concerns:
//!
//! ```text
//! ┌──────────────────┐   path   ┌──────────────────┐  argv   ┌─────────────┐
//! │ CredentialScope  │────────▶│  VpnController   │───────▶│    Shell    │
//! │ (temp auth file) │         │ (country → .ovpn) │        │ (sudo exec) │
//! └──────────────────┘         └──────────────────┘        └─────────────┘
//! ```
//!
//! # Features
//!
//! - **Scoped credentials**: the auth file lives in a private temp
//!   directory that is removed when the scope ends
//! - **Checked connect**: a failing `openvpn` launch is an error carrying
//!   the process output
//! - **Tolerant disconnect**: "nothing to kill" is a normal outcome

mod credentials;
mod shell;
mod controller;

pub use credentials::{CredentialScope, CREDENTIALS_FILE_NAME};
pub use shell::{CommandLine, ExecMode, ProcessOutcome, Shell, ShellError, SystemShell};
pub use controller::{CountryConfigMap, VpnController, VpnError, DAEMON_NAME};
