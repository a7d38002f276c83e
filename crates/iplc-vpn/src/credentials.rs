//! Credential Scope
//!
//! OpenVPN reads `--auth-user-pass` credentials from a file. The scope
//! writes that file into a private temporary directory and removes the
//! directory again when the scope ends, either through [`CredentialScope::close`]
//! or when the owner drops it.
//!
//! # File Layout
//!
//! ```text
//! <username>\n
//! <password>\n
//! ```

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Name of the credentials file inside the scope directory
pub const CREDENTIALS_FILE_NAME: &str = "openvpn_credentials";

/// Owns the transient credentials file for one connection lifetime
#[derive(Debug)]
pub struct CredentialScope {
    /// Temp directory (None once released)
    dir: Option<TempDir>,
    /// Path of the credentials file
    path: PathBuf,
}

impl CredentialScope {
    /// Create a new scope and write the credentials file
    ///
    /// Empty values are written as empty lines. Whether "no credentials"
    /// should skip the scope entirely is up to the caller.
    pub fn new(username: &str, password: &str) -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("iplc-").tempdir()?;
        let path = dir.path().join(CREDENTIALS_FILE_NAME);

        let mut file = File::create(&path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        write!(file, "{}\n{}\n", username, password)?;
        file.flush()?;

        debug!("Credentials written to {}", path.display());

        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    /// Path of the credentials file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the credentials directory now
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(dir) = self.dir.take() {
            let dir_path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!("Removed credentials directory {}", dir_path.display()),
                Err(e) => warn!(
                    "Failed to remove credentials directory {}: {}",
                    dir_path.display(),
                    e
                ),
            }
        }
    }
}

impl Drop for CredentialScope {
    fn drop(&mut self) {
        self.release();
    }
}
