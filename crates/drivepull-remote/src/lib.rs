//! drivepull remote - destination cloud filesystem adapter
//!
//! Provides:
//! - a [`DestinationApi`](drivepull_core::ports::DestinationApi)
//!   implementation over the destination's JSON REST API
//! - instant-upload negotiation with range checks, and streamed direct uploads
//! - a file-backed [`CredentialStore`](drivepull_core::ports::CredentialStore)
//!
//! ## Modules
//!
//! - [`client`] - HTTP client, bearer credentials, entry endpoints
//! - [`upload`] - Upload negotiation and direct upload
//! - [`credentials`] - Credentials file discovery and persistence

pub mod client;
pub mod credentials;
pub mod upload;

pub use client::RemoteClient;
pub use credentials::FileCredentialStore;

use drivepull_core::domain::ApiError;
use reqwest::Response;

/// Maps a reqwest failure onto an [`ApiError`] category
///
/// Statuses use the destination mapping, where 401/403/405 mean the bearer
/// token expired. The source adapter keeps its own copy with
/// `ApiError::from_source_status` instead.
pub(crate) fn transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout(e.to_string())
    } else if e.is_connect() {
        ApiError::Connection(e.to_string())
    } else if let Some(status) = e.status() {
        ApiError::from_status(status.as_u16(), e.to_string())
    } else if e.is_decode() {
        ApiError::InvalidResponse(e.to_string())
    } else {
        ApiError::Connection(e.to_string())
    }
}

/// Turns a non-2xx response into an error carrying the response text
pub(crate) async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        format!(
            "{} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("unknown status")
        )
    } else {
        body
    };
    Err(ApiError::from_status(status.as_u16(), message))
}

/// Reads a JSON body, reporting undecodable payloads as [`ApiError::InvalidResponse`]
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    response: Response,
) -> Result<T, ApiError> {
    let body = check_status(response)
        .await?
        .bytes()
        .await
        .map_err(transport_error)?;
    serde_json::from_slice(&body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
}
