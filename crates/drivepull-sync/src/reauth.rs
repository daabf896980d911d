//! Single-flight reauthentication
//!
//! When the destination starts refusing calls, many workers notice at once.
//! [`ReauthCoordinator`] makes sure that only one of them actually
//! reauthenticates; the others find the credentials already refreshed once
//! they get the lock.
//!
//! ## Protocol
//!
//! Callers sample the coordinator's epoch *before* issuing the call that may
//! fail, then hand the sample to [`ReauthCoordinator::refresh`]. Inside the
//! reauth lock:
//!
//! 1. epoch moved since sampling: someone else refreshed, nothing to do
//! 2. credential store version differs from the last one seen: the file was
//!    rewritten externally, adopt it
//! 3. otherwise reauthenticate against the destination and persist the
//!    result

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use drivepull_core::domain::ApiError;
use drivepull_core::ports::{CredentialStore, CredentialVersion, DestinationApi};

/// Epoch sampled before a call that may need reauthentication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochSample(u64);

/// How a [`ReauthCoordinator::refresh`] call was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A concurrent caller refreshed the credentials first
    AlreadyRefreshed,
    /// Credentials rewritten by another process were adopted
    AdoptedExternal,
    /// A new session was obtained from the destination
    Reauthenticated,
}

#[derive(Debug, Default)]
struct Marker {
    epoch: u64,
    version: Option<CredentialVersion>,
}

/// Serializes credential refreshes and wraps guarded destination calls
pub struct ReauthCoordinator {
    destination: Arc<dyn DestinationApi>,
    credentials: Arc<dyn CredentialStore>,
    device_kind: String,
    max_rounds: u32,
    marker: Mutex<Marker>,
    reauth_lock: tokio::sync::Mutex<()>,
    call_lock: Option<tokio::sync::Mutex<()>>,
    reauth_count: AtomicU64,
}

impl ReauthCoordinator {
    /// Creates a coordinator
    ///
    /// # Arguments
    /// * `device_kind` - Device kind requested when reauthenticating
    /// * `max_rounds` - Reauthentications one guarded call may trigger
    /// * `serialize_calls` - Run guarded calls one at a time
    pub fn new(
        destination: Arc<dyn DestinationApi>,
        credentials: Arc<dyn CredentialStore>,
        device_kind: impl Into<String>,
        max_rounds: u32,
        serialize_calls: bool,
    ) -> Self {
        Self {
            destination,
            credentials,
            device_kind: device_kind.into(),
            max_rounds: max_rounds.max(1),
            marker: Mutex::new(Marker::default()),
            reauth_lock: tokio::sync::Mutex::new(()),
            call_lock: serialize_calls.then(|| tokio::sync::Mutex::new(())),
            reauth_count: AtomicU64::new(0),
        }
    }

    fn marker(&self) -> MutexGuard<'_, Marker> {
        self.marker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads the persisted credentials, if any, into the destination
    ///
    /// Returns `false` when the store holds nothing yet.
    pub async fn prime(&self) -> anyhow::Result<bool> {
        let _guard = self.reauth_lock.lock().await;
        let Some(version) = self.credentials.version().await? else {
            return Ok(false);
        };
        let creds = self.credentials.load().await?;
        self.destination.set_credentials(creds);
        self.marker().version = Some(version);
        Ok(true)
    }

    /// Samples the current epoch
    pub fn sample(&self) -> EpochSample {
        EpochSample(self.marker().epoch)
    }

    /// Number of physical reauthentications performed so far
    pub fn reauth_count(&self) -> u64 {
        self.reauth_count.load(Ordering::SeqCst)
    }

    /// Refreshes stale credentials at most once per epoch
    #[tracing::instrument(skip(self), fields(device = %self.device_kind))]
    pub async fn refresh(&self, sampled: EpochSample) -> Result<RefreshOutcome, ApiError> {
        let _guard = self.reauth_lock.lock().await;

        let known_version = {
            let marker = self.marker();
            if marker.epoch != sampled.0 {
                debug!("Credentials already refreshed by a concurrent caller");
                return Ok(RefreshOutcome::AlreadyRefreshed);
            }
            marker.version
        };

        match self.credentials.version().await {
            Ok(Some(current)) if Some(current) != known_version => {
                match self.credentials.load().await {
                    Ok(creds) => {
                        self.destination.set_credentials(creds);
                        self.bump(Some(current));
                        info!("Adopted credentials updated outside this run");
                        return Ok(RefreshOutcome::AdoptedExternal);
                    }
                    Err(e) => warn!(error = %e, "Failed to load updated credentials"),
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to read credential version"),
        }

        info!("Reauthenticating with the destination");
        let creds = self
            .destination
            .reauthenticate(&self.device_kind, true)
            .await?;
        self.reauth_count.fetch_add(1, Ordering::SeqCst);

        let version = match self.credentials.save(&creds).await {
            Ok(version) => Some(version),
            Err(e) => {
                warn!(error = %e, "Failed to persist new credentials");
                known_version
            }
        };
        self.bump(version);
        Ok(RefreshOutcome::Reauthenticated)
    }

    fn bump(&self, version: Option<CredentialVersion>) {
        let mut marker = self.marker();
        marker.epoch += 1;
        marker.version = version;
    }

    /// Runs a destination call, reauthenticating on "not allowed"
    ///
    /// The call is repeated after each refresh, up to the configured number
    /// of rounds; the last error is returned once they are used up.
    pub async fn guarded<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut round = 0;
        loop {
            let sampled = self.sample();
            let result = match &self.call_lock {
                Some(lock) => {
                    let _serialized = lock.lock().await;
                    call().await
                }
                None => call().await,
            };

            match result {
                Err(e) if e.is_not_allowed() && round < self.max_rounds => {
                    round += 1;
                    warn!(operation, round, error = %e, "Destination call not allowed");
                    if let Err(reauth_err) = self.refresh(sampled).await {
                        warn!(operation, error = %reauth_err, "Reauthentication failed");
                    }
                }
                other => return other,
            }
        }
    }
}
