//! File transfer
//!
//! Offers each file to the destination by hash first. Only when the
//! destination does not know the content are the bytes streamed from the
//! source download URL, subject to the direct-upload policy.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use drivepull_core::domain::{ApiError, Entry, Task, TaskError};
use drivepull_core::ports::{NegotiationOutcome, RangeReader, SourceApi, UploadRequest};

use crate::context::SyncContext;

/// Files below this size are renegotiated instead of uploaded directly
pub const SMALL_FILE_THRESHOLD: u64 = 1 << 20;

/// Negotiation attempts per execution for small files
pub const NEGOTIATION_ATTEMPTS: u32 = 3;

// ============================================================================
// DirectUploadPolicy
// ============================================================================

/// Whether file content may be streamed when instant upload fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectUploadPolicy {
    Always,
    Never,
    /// Only files of at most this many bytes
    UpTo(u64),
}

impl DirectUploadPolicy {
    /// Maps `direct_upload_max_size`: absent always, negative never
    pub fn from_limit(limit: Option<i64>) -> Self {
        match limit {
            None => Self::Always,
            Some(n) if n < 0 => Self::Never,
            Some(n) => Self::UpTo(n.unsigned_abs()),
        }
    }

    pub fn allows(&self, size: u64) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::UpTo(limit) => size <= *limit,
        }
    }
}

// ============================================================================
// Transfer
// ============================================================================

/// How a file reached the destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transferred {
    /// Accepted by hash, no bytes sent
    Instant,
    /// Content streamed from the source
    Direct(Entry),
}

/// Reads ranges of one source file for upload verification
struct SourceRangeReader {
    source: Arc<dyn SourceApi>,
    url: Option<String>,
}

#[async_trait::async_trait]
impl RangeReader for SourceRangeReader {
    async fn read_range(&self, range: &str) -> Result<Bytes, ApiError> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| ApiError::InvalidResponse("source entry has no download url".into()))?;
        self.source
            .read_range(url, range)
            .await
            .map_err(ApiError::into_source_error)
    }
}

/// Executes one file task
pub async fn transfer_file(ctx: &SyncContext, task: &Task) -> Result<Transferred, TaskError> {
    let source = &task.source;

    let Some(hash) = source.hash.as_deref() else {
        debug!(task_id = %source.id, path = %source.path, "No content hash, uploading directly");
        return direct_upload(ctx, task).await;
    };

    let request = UploadRequest {
        name: source.name.clone(),
        parent_id: task.dest_parent_id.clone(),
        size: source.size,
        hash: hash.to_ascii_uppercase(),
    };
    let reader = SourceRangeReader {
        source: Arc::clone(&ctx.source),
        url: source.url.clone(),
    };

    let mut remaining = NEGOTIATION_ATTEMPTS;
    loop {
        remaining -= 1;
        let negotiation = ctx
            .destination
            .negotiate_upload(&request, &reader)
            .await?;

        match negotiation.outcome() {
            NegotiationOutcome::Accepted => {
                debug!(task_id = %source.id, path = %source.path, "Instant upload accepted");
                return Ok(Transferred::Instant);
            }
            NegotiationOutcome::NeedsUpload => {
                if !ctx.upload_policy.allows(source.size) {
                    return Err(TaskError::DirectUploadRefused { size: source.size });
                }
                if source.size < SMALL_FILE_THRESHOLD && remaining > 0 {
                    debug!(
                        task_id = %source.id,
                        remaining,
                        "Instant upload declined for small file, negotiating again"
                    );
                    continue;
                }
                return direct_upload(ctx, task).await;
            }
            NegotiationOutcome::Ambiguous => {
                return Err(TaskError::UploadAmbiguous {
                    status: negotiation.status,
                    status_code: negotiation.status_code,
                });
            }
            NegotiationOutcome::Rejected => {
                return Err(TaskError::UploadRejected {
                    status: negotiation.status,
                    status_code: negotiation.status_code,
                    message: negotiation
                        .data
                        .map(|d| d.to_string())
                        .unwrap_or_default(),
                });
            }
        }
    }
}

async fn direct_upload(ctx: &SyncContext, task: &Task) -> Result<Transferred, TaskError> {
    let source = &task.source;
    if !ctx.upload_policy.allows(source.size) {
        return Err(TaskError::DirectUploadRefused { size: source.size });
    }
    let url = source
        .url
        .as_deref()
        .ok_or_else(|| TaskError::Unexpected(format!("{} has no download url", source.path)))?;

    warn!(
        task_id = %source.id,
        path = %source.path,
        size = source.size,
        "Falling back to direct upload"
    );
    let body = ctx
        .source
        .open(url)
        .await
        .map_err(ApiError::into_source_error)?;
    let entry = ctx
        .destination
        .direct_upload(body, &source.name, &task.dest_parent_id)
        .await?;
    Ok(Transferred::Direct(entry))
}
