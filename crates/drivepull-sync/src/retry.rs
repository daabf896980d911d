//! Retry classification
//!
//! A pure decision over an error, the task's attempt count and the retry
//! mode configured through `max_retries`.

use drivepull_core::domain::{ApiError, TaskError};

/// Retry mode derived from `transfer.max_retries`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Retry transport, server and authorization failures without limit;
    /// everything else is fatal
    Selective,
    /// Every error is fatal
    Never,
    /// Any error is retried while the task has run at most this many times
    Bounded(u32),
}

impl RetryPolicy {
    /// Maps the configured value: negative is selective, 0 never, n bounded
    pub fn from_max_retries(max_retries: i64) -> Self {
        match max_retries {
            n if n < 0 => Self::Selective,
            0 => Self::Never,
            n => Self::Bounded(u32::try_from(n).unwrap_or(u32::MAX)),
        }
    }

    /// Decides what happens to a task after `error` ended attempt number `attempts`
    pub fn classify(&self, error: &TaskError, attempts: u32) -> RetryDecision {
        let retry = match self {
            Self::Never => false,
            Self::Bounded(limit) => attempts <= *limit,
            Self::Selective => is_selectively_retryable(error),
        };

        if !retry {
            return RetryDecision::Fatal;
        }
        RetryDecision::Retry {
            reauthenticate: error.as_api().is_some_and(ApiError::is_not_allowed),
        }
    }
}

fn is_selectively_retryable(error: &TaskError) -> bool {
    match error {
        TaskError::Api(api) => api.is_not_allowed() || api.is_transient(),
        TaskError::UploadAmbiguous { .. } => true,
        TaskError::DirectUploadRefused { .. }
        | TaskError::UploadRejected { .. }
        | TaskError::Unexpected(_) => false,
    }
}

/// Outcome of [`RetryPolicy::classify`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Resubmit the task; refresh credentials first when `reauthenticate` is set
    Retry { reauthenticate: bool },
    /// Abandon the task
    Fatal,
}

impl RetryDecision {
    pub fn is_retry(&self) -> bool {
        matches!(self, Self::Retry { .. })
    }
}
