//! Source API client
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use drivepull_core::domain::{EntryId, EntryRef};
//! use drivepull_core::ports::SourceApi;
//! use drivepull_source::SourceClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = SourceClient::new("http://localhost:8000", Duration::from_secs(30))?;
//! let root = client.attr(&EntryRef::Id(EntryId::from(0))).await?;
//! println!("{} ({} bytes)", root.path, root.size);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use drivepull_core::config::SourceConfig;
use drivepull_core::domain::{ApiError, Entry, EntryRef};
use drivepull_core::ports::{ByteStream, SourceApi};
use futures_util::StreamExt;
use reqwest::header::RANGE;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

// ============================================================================
// Error mapping
// ============================================================================
//
// Mirrors the destination adapter's mapping except for HTTP statuses, which
// go through `ApiError::from_source_status`: the source has no credentials
// to refresh, so 401/403/405 must never surface as `NotAllowed`.

/// Maps a reqwest failure onto an [`ApiError`] category
pub(crate) fn transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout(e.to_string())
    } else if e.is_connect() {
        ApiError::Connection(e.to_string())
    } else if let Some(status) = e.status() {
        ApiError::from_source_status(status.as_u16(), e.to_string())
    } else if e.is_decode() {
        ApiError::InvalidResponse(e.to_string())
    } else {
        ApiError::Connection(e.to_string())
    }
}

/// Turns a non-2xx response into an error carrying the response text
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("unknown status").to_string()
    } else {
        body
    };
    Err(ApiError::from_source_status(status.as_u16(), message))
}

// ============================================================================
// SourceClient
// ============================================================================

/// HTTP client for the read-only source API
#[derive(Debug, Clone)]
pub struct SourceClient {
    client: Client,
    base_url: Url,
}

impl SourceClient {
    /// Creates a client for the API served at `base_url`
    ///
    /// # Arguments
    /// * `base_url` - URL answering the `?id=..&method=..` queries
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid source URL: {base_url}"))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build source HTTP client")?;
        Ok(Self { client, base_url })
    }

    /// Creates a client from the `source` configuration section
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    /// Returns the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds the query URL for `method` on `entry`
    fn endpoint(&self, entry: &EntryRef, method: &str) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            match entry {
                EntryRef::Id(id) => query.append_pair("id", id.as_str()),
                EntryRef::Path(path) => query.append_pair("path", path),
            };
            query.append_pair("method", method);
        }
        url
    }

    /// Resolves a possibly relative content URL against the base URL
    fn resolve(&self, url: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(url)
            .map_err(|e| ApiError::InvalidResponse(format!("bad content url {url:?}: {e}")))
    }

    fn absolutize(&self, mut entry: Entry) -> Result<Entry, ApiError> {
        if let Some(url) = entry.url.take() {
            entry.url = Some(self.resolve(&url)?.to_string());
        }
        Ok(entry)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(transport_error)?;
        let body = check_status(response)
            .await?
            .bytes()
            .await
            .map_err(transport_error)?;
        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    async fn get_content(&self, url: &str, range: Option<&str>) -> Result<Response, ApiError> {
        let mut request = self.client.get(self.resolve(url)?);
        if let Some(range) = range {
            request = request.header(RANGE, format!("bytes={range}"));
        }
        let response = request.send().await.map_err(transport_error)?;
        check_status(response).await
    }
}

#[async_trait::async_trait]
impl SourceApi for SourceClient {
    async fn attr(&self, entry: &EntryRef) -> Result<Entry, ApiError> {
        debug!(entry = %entry, "Fetching source attributes");
        let attr: Entry = self.get_json(self.endpoint(entry, "attr")).await?;
        self.absolutize(attr)
    }

    async fn list_children(&self, entry: &EntryRef) -> Result<Vec<Entry>, ApiError> {
        debug!(entry = %entry, "Listing source directory");
        let children: Vec<Entry> = self.get_json(self.endpoint(entry, "list")).await?;
        children
            .into_iter()
            .map(|child| self.absolutize(child))
            .collect()
    }

    async fn read_range(&self, url: &str, range: &str) -> Result<Bytes, ApiError> {
        self.get_content(url, Some(range))
            .await?
            .bytes()
            .await
            .map_err(transport_error)
    }

    async fn open(&self, url: &str) -> Result<ByteStream, ApiError> {
        let response = self.get_content(url, None).await?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(transport_error))
            .boxed())
    }
}
