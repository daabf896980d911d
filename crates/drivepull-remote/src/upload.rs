//! Upload operations
//!
//! - [`negotiate`] - instant upload by content hash, with the optional
//!   range check the destination may ask for
//! - [`direct_upload`] - streams file content to the destination
//!
//! ## Range checks
//!
//! When the destination already knows a hash it may want proof that the
//! client really holds the content. It answers the first `upload/init` with
//! a `check_range`; the client hashes that byte range and repeats the init
//! with the digest as `check_value`. The second answer is final.

use drivepull_core::domain::{ApiError, Entry, EntryId};
use drivepull_core::ports::{ByteStream, RangeReader, UploadNegotiation, UploadRequest};
use reqwest::{Body, Method};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::client::RemoteClient;

// ============================================================================
// Negotiation payloads
// ============================================================================

#[derive(Debug, Serialize)]
struct InitRequest<'a> {
    name: &'a str,
    parent_id: &'a str,
    size: u64,
    hash: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    check_value: Option<String>,
}

impl<'a> InitRequest<'a> {
    fn from_upload(request: &'a UploadRequest) -> Self {
        Self {
            name: &request.name,
            parent_id: request.parent_id.as_str(),
            size: request.size,
            hash: &request.hash,
            check_value: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InitResponse {
    #[serde(flatten)]
    negotiation: UploadNegotiation,
    #[serde(default)]
    check_range: Option<String>,
}

/// Upper-case hex SHA-1 of `data`
pub fn sha1_hex(data: &[u8]) -> String {
    Sha1::digest(data)
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect()
}

// ============================================================================
// Operations
// ============================================================================

async fn init(client: &RemoteClient, body: &InitRequest<'_>) -> Result<InitResponse, ApiError> {
    let request = client.request(Method::POST, "upload/init")?.json(body);
    client.send_json(request).await
}

/// Negotiates an instant upload
///
/// # Arguments
/// * `request` - Name, parent, size and hash of the file
/// * `reader` - Access to the file content, used only for range checks
pub async fn negotiate(
    client: &RemoteClient,
    request: &UploadRequest,
    reader: &dyn RangeReader,
) -> Result<UploadNegotiation, ApiError> {
    let mut body = InitRequest::from_upload(request);
    let first = init(client, &body).await?;

    let Some(range) = first.check_range else {
        return Ok(first.negotiation);
    };

    debug!(name = %request.name, range = %range, "Destination asked for a range check");
    let sample = reader.read_range(&range).await?;
    body.check_value = Some(sha1_hex(&sample));
    let second = init(client, &body).await?;
    Ok(second.negotiation)
}

/// Uploads a file by streaming its content
pub async fn direct_upload(
    client: &RemoteClient,
    content: ByteStream,
    name: &str,
    parent_id: &EntryId,
) -> Result<Entry, ApiError> {
    let request = client
        .request(Method::POST, "upload/direct")?
        .query(&[("name", name), ("parent_id", parent_id.as_str())])
        .body(Body::wrap_stream(content));
    let entry: Entry = client.send_json(request).await?;
    debug!(name, parent_id = %parent_id, id = %entry.id, size = entry.size, "Direct upload finished");
    Ok(entry)
}
