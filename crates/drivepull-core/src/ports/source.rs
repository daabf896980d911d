//! Source filesystem port
//!
//! The source is reachable only through a minimal read-only API: entry
//! attributes, directory listings and byte access to file content.

use bytes::Bytes;
use futures_util::stream::BoxStream;

use crate::domain::{ApiError, Entry, EntryRef};

/// Stream of file content chunks
pub type ByteStream = BoxStream<'static, Result<Bytes, ApiError>>;

/// Port trait for the read-only source API
#[async_trait::async_trait]
pub trait SourceApi: Send + Sync {
    /// Fetches the attributes of one entry
    async fn attr(&self, entry: &EntryRef) -> Result<Entry, ApiError>;

    /// Lists the direct children of a directory
    async fn list_children(&self, entry: &EntryRef) -> Result<Vec<Entry>, ApiError>;

    /// Reads a byte range of a file
    ///
    /// # Arguments
    /// * `url` - Download URL of the file (as reported in [`Entry::url`])
    /// * `range` - HTTP range spec without the unit, e.g. `"0-1023"`
    async fn read_range(&self, url: &str, range: &str) -> Result<Bytes, ApiError>;

    /// Opens the full content of a file as a stream
    async fn open(&self, url: &str) -> Result<ByteStream, ApiError>;
}
