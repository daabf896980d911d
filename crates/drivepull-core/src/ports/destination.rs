//! Destination filesystem port
//!
//! The destination is an authenticated cloud filesystem. Besides the usual
//! attribute/listing/create calls it supports hash-based instant uploads:
//! the client offers name, size and content hash, and the service either
//! accepts the file without receiving any bytes or asks for a real upload.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::credentials::Credentials;
use super::source::ByteStream;
use crate::domain::{ApiError, Entry, EntryId, EntryRef};

// ============================================================================
// Upload negotiation DTOs
// ============================================================================

/// Offer sent to the destination when negotiating an instant upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadRequest {
    pub name: String,
    pub parent_id: EntryId,
    pub size: u64,
    /// Upper-case hex content hash
    pub hash: String,
}

/// Raw answer of an upload negotiation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadNegotiation {
    pub status: i64,
    #[serde(rename = "statuscode", alias = "status_code", default)]
    pub status_code: i64,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Classified negotiation answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationOutcome {
    /// The file was accepted without transferring content
    Accepted,
    /// The destination does not know the content; bytes must be sent
    NeedsUpload,
    /// Inconclusive answer; asking again later may succeed
    Ambiguous,
    /// Refused outright
    Rejected,
}

impl UploadNegotiation {
    pub fn new(status: i64, status_code: i64) -> Self {
        Self {
            status,
            status_code,
            data: None,
        }
    }

    pub fn outcome(&self) -> NegotiationOutcome {
        match (self.status, self.status_code) {
            (2, 0) => NegotiationOutcome::Accepted,
            (1, 0) => NegotiationOutcome::NeedsUpload,
            (0, 0) | (0, 413) => NegotiationOutcome::Ambiguous,
            _ => NegotiationOutcome::Rejected,
        }
    }
}

/// Random access to the content being negotiated
///
/// Some destinations verify an instant upload by asking for the hash of an
/// arbitrary byte range of the file.
#[async_trait::async_trait]
pub trait RangeReader: Send + Sync {
    /// Reads the bytes of `range` (`"start-end"`, inclusive)
    async fn read_range(&self, range: &str) -> Result<Bytes, ApiError>;
}

// ============================================================================
// DestinationApi
// ============================================================================

/// Port trait for the destination cloud filesystem
#[async_trait::async_trait]
pub trait DestinationApi: Send + Sync {
    /// Fetches the attributes of one entry
    async fn attr(&self, entry: &EntryRef) -> Result<Entry, ApiError>;

    /// Creates a directory
    ///
    /// Fails with [`ApiError::AlreadyExists`] when `parent_id` already holds
    /// an entry named `name`.
    async fn make_directory(&self, name: &str, parent_id: &EntryId) -> Result<Entry, ApiError>;

    /// Lists the direct children of a directory
    async fn list_children(&self, parent_id: &EntryId) -> Result<Vec<Entry>, ApiError>;

    /// Negotiates an instant upload
    async fn negotiate_upload(
        &self,
        request: &UploadRequest,
        reader: &dyn RangeReader,
    ) -> Result<UploadNegotiation, ApiError>;

    /// Uploads file content streamed from `body`
    async fn direct_upload(
        &self,
        body: ByteStream,
        name: &str,
        parent_id: &EntryId,
    ) -> Result<Entry, ApiError>;

    /// Obtains fresh credentials, optionally replacing an existing session
    /// for the same device kind
    async fn reauthenticate(
        &self,
        device_kind: &str,
        force_replace: bool,
    ) -> Result<Credentials, ApiError>;

    /// Replaces the credentials used for subsequent calls
    fn set_credentials(&self, credentials: Credentials);
}
