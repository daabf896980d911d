//! File-backed credential store
//!
//! The credentials file holds the bearer token as plain text. Its version is
//! the modification time in nanoseconds, so a file rewritten by another
//! process (or by hand) is noticed the next time a worker needs to
//! reauthenticate.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use drivepull_core::ports::{CredentialStore, CredentialVersion, Credentials};
use tracing::debug;

/// File name looked up by [`FileCredentialStore::discover`]
pub const CREDENTIALS_FILE_NAME: &str = "drivepull-credentials.txt";

/// Credential store backed by one text file
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path of the credentials file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Looks for an existing credentials file
    ///
    /// Checks `drivepull-credentials.txt` in `cwd`, then in the home
    /// directory. Returns `None` when neither exists.
    pub fn discover(cwd: &Path) -> Option<PathBuf> {
        let home = dirs::home_dir();
        std::iter::once(cwd.to_path_buf())
            .chain(home)
            .map(|dir| dir.join(CREDENTIALS_FILE_NAME))
            .find(|candidate| candidate.is_file())
    }

    async fn stat_version(&self) -> Result<Option<CredentialVersion>> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("Failed to stat {}", self.path.display())))
            }
        };
        let modified = metadata
            .modified()
            .with_context(|| format!("No modification time for {}", self.path.display()))?;
        let nanos = modified
            .duration_since(UNIX_EPOCH)
            .context("Credentials file modified before the epoch")?
            .as_nanos();
        Ok(Some(CredentialVersion(nanos)))
    }
}

#[async_trait::async_trait]
impl CredentialStore for FileCredentialStore {
    async fn version(&self) -> Result<Option<CredentialVersion>> {
        self.stat_version().await
    }

    async fn load(&self) -> Result<Credentials> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read credentials from {}", self.path.display()))?;
        let credentials = Credentials::new(raw.trim());
        if credentials.is_empty() {
            anyhow::bail!("Credentials file {} is empty", self.path.display());
        }
        Ok(credentials)
    }

    async fn save(&self, credentials: &Credentials) -> Result<CredentialVersion> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&self.path, credentials.expose())
            .await
            .with_context(|| format!("Failed to write credentials to {}", self.path.display()))?;
        debug!(path = %self.path.display(), "Saved credentials");

        self.stat_version()
            .await?
            .with_context(|| format!("Credentials file {} vanished", self.path.display()))
    }
}
