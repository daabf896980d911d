//! Destination REST API client
//!
//! Speaks the destination's JSON dialect:
//!
//! | call | request |
//! |---|---|
//! | attributes | `GET /files/{id}`, `GET /files?path=..` |
//! | create directory | `POST /files/{parent}/folders` |
//! | listing | `GET /files/{parent}/children` |
//! | upload | `POST /upload/init`, `POST /upload/direct` |
//! | session | `POST /auth/device` |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use drivepull_core::domain::{EntryId, EntryRef};
//! use drivepull_core::ports::{Credentials, DestinationApi};
//! use drivepull_remote::RemoteClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = RemoteClient::new("https://cloud.example.com/api", Duration::from_secs(30))?;
//! client.set_credentials(Credentials::new("token"));
//! let root = client.attr(&EntryRef::Id(EntryId::from(0))).await?;
//! println!("{}", root.name);
//! # Ok(())
//! # }
//! ```

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};
use drivepull_core::config::DestinationConfig;
use drivepull_core::domain::{ApiError, Entry, EntryId, EntryRef};
use drivepull_core::ports::{
    ByteStream, Credentials, DestinationApi, RangeReader, UploadNegotiation, UploadRequest,
};
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::{read_json, transport_error, upload};

// ============================================================================
// API payloads
// ============================================================================

#[derive(Debug, Serialize)]
struct NewFolder<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChildrenResponse {
    items: Vec<Entry>,
}

#[derive(Debug, Serialize)]
struct DeviceLogin<'a> {
    device: &'a str,
    replace: bool,
}

#[derive(Debug, Deserialize)]
struct DeviceLoginResponse {
    token: String,
}

// ============================================================================
// RemoteClient
// ============================================================================

/// HTTP client for the destination cloud filesystem
///
/// Credentials are a bearer token held behind a lock so that a refresh
/// performed by one worker is seen by every in-flight request that starts
/// afterwards.
#[derive(Debug)]
pub struct RemoteClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests, always ending in `/`
    base_url: Url,
    /// Current bearer token
    credentials: RwLock<Credentials>,
}

impl RemoteClient {
    /// Creates a client without credentials
    ///
    /// # Arguments
    /// * `base_url` - Root of the REST API
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url =
            Url::parse(base_url).with_context(|| format!("Invalid destination URL: {base_url}"))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build destination HTTP client")?;
        Ok(Self {
            client,
            base_url,
            credentials: RwLock::new(Credentials::new("")),
        })
    }

    /// Creates a client from the `destination` configuration section
    pub fn from_config(config: &DestinationConfig) -> Result<Self> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    /// Returns the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns a copy of the current credentials
    pub fn credentials(&self) -> Credentials {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidResponse(format!("bad request path {path:?}: {e}")))
    }

    /// Creates an authenticated request builder for `path` relative to the base URL
    pub(crate) fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let builder = self.client.request(method, self.url(path)?);
        let credentials = self.credentials();
        Ok(if credentials.is_empty() {
            builder
        } else {
            builder.bearer_auth(credentials.expose())
        })
    }

    /// Sends a request and decodes its JSON answer
    pub(crate) async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request.send().await.map_err(transport_error)?;
        read_json(response).await
    }
}

#[async_trait::async_trait]
impl DestinationApi for RemoteClient {
    async fn attr(&self, entry: &EntryRef) -> Result<Entry, ApiError> {
        let request = match entry {
            EntryRef::Id(id) => self.request(Method::GET, &format!("files/{id}"))?,
            EntryRef::Path(path) => self
                .request(Method::GET, "files")?
                .query(&[("path", path.as_str())]),
        };
        debug!(entry = %entry, "Fetching destination attributes");
        self.send_json(request).await
    }

    async fn make_directory(&self, name: &str, parent_id: &EntryId) -> Result<Entry, ApiError> {
        let request = self
            .request(Method::POST, &format!("files/{parent_id}/folders"))?
            .json(&NewFolder { name });
        let entry: Entry = self.send_json(request).await?;
        debug!(name, parent_id = %parent_id, id = %entry.id, "Created destination directory");
        Ok(entry)
    }

    async fn list_children(&self, parent_id: &EntryId) -> Result<Vec<Entry>, ApiError> {
        let request = self.request(Method::GET, &format!("files/{parent_id}/children"))?;
        let children: ChildrenResponse = self.send_json(request).await?;
        Ok(children.items)
    }

    async fn negotiate_upload(
        &self,
        request: &UploadRequest,
        reader: &dyn RangeReader,
    ) -> Result<UploadNegotiation, ApiError> {
        upload::negotiate(self, request, reader).await
    }

    async fn direct_upload(
        &self,
        body: ByteStream,
        name: &str,
        parent_id: &EntryId,
    ) -> Result<Entry, ApiError> {
        upload::direct_upload(self, body, name, parent_id).await
    }

    async fn reauthenticate(
        &self,
        device_kind: &str,
        force_replace: bool,
    ) -> Result<Credentials, ApiError> {
        let request = self
            .request(Method::POST, "auth/device")?
            .json(&DeviceLogin {
                device: device_kind,
                replace: force_replace,
            });
        let login: DeviceLoginResponse = self.send_json(request).await?;
        let credentials = Credentials::new(login.token);
        if credentials.is_empty() {
            return Err(ApiError::InvalidResponse(
                "device login returned an empty token".to_string(),
            ));
        }
        self.set_credentials(credentials.clone());
        info!(device = device_kind, "Obtained a new destination session");
        Ok(credentials)
    }

    fn set_credentials(&self, credentials: Credentials) {
        *self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner) = credentials;
        debug!("Updated destination credentials");
    }
}
