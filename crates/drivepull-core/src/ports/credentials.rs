//! Credential persistence port

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque credentials for the destination API
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(String);

impl Credentials {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw secret
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(***)")
    }
}

/// Version marker of the persisted credentials
///
/// File-backed stores use the modification time in nanoseconds; any value
/// that changes on every write works.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CredentialVersion(pub u128);

/// Port trait for credential persistence
///
/// Errors are adapter-specific and reported as `anyhow::Error`.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Current version of the persisted credentials, `None` if nothing is stored
    async fn version(&self) -> anyhow::Result<Option<CredentialVersion>>;

    /// Loads the persisted credentials
    async fn load(&self) -> anyhow::Result<Credentials>;

    /// Persists new credentials and returns the resulting version
    async fn save(&self, credentials: &Credentials) -> anyhow::Result<CredentialVersion>;
}
