//! Domain error types
//!
//! Three layers of errors live here: [`DomainError`] for validation of
//! domain values, [`ApiError`] for failures reported by the source or
//! destination APIs, and [`TaskError`] for everything that can go wrong
//! while one task executes.

use thiserror::Error;

/// Errors that can occur while constructing domain values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid entry identifier
    #[error("Invalid entry id: {0}")]
    InvalidEntryId(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

// ============================================================================
// ApiError
// ============================================================================

/// Failure categories reported by the remote filesystem APIs
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The destination no longer accepts the credentials (HTTP 401/403/405)
    #[error("Not allowed: {0}")]
    NotAllowed(String),

    /// The request was rejected by the server (other 4xx)
    #[error("Client error {status}: {message}")]
    Client { status: u16, message: String },

    /// The server failed to process the request (5xx)
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// The request timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The connection could not be established or was reset
    #[error("Connection failed: {0}")]
    Connection(String),

    /// An entry with the requested name already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The addressed entry does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The response body could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Maps an HTTP error status returned by the destination API
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 | 405 => Self::NotAllowed(message),
            404 => Self::NotFound(message),
            409 => Self::AlreadyExists(message),
            400..=499 => Self::Client { status, message },
            _ => Self::Server { status, message },
        }
    }

    /// Maps an HTTP error status returned by the source API
    ///
    /// Unlike [`ApiError::from_status`], authorization refusals are client
    /// rejections here: only the destination's credentials are refreshable.
    pub fn from_source_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 => Self::NotFound(message),
            400..=499 => Self::Client { status, message },
            _ => Self::Server { status, message },
        }
    }

    /// Demotes a `NotAllowed` raised on the source side to a 403 client rejection
    #[must_use]
    pub fn into_source_error(self) -> Self {
        match self {
            Self::NotAllowed(message) => Self::Client {
                status: 403,
                message,
            },
            other => other,
        }
    }

    /// Stable name of the category, used as the key of the error histogram
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotAllowed(_) => "NotAllowed",
            Self::Client { .. } => "ClientError",
            Self::Server { .. } => "ServerError",
            Self::Timeout(_) => "Timeout",
            Self::Connection(_) => "ConnectionError",
            Self::AlreadyExists(_) => "AlreadyExists",
            Self::NotFound(_) => "NotFound",
            Self::InvalidResponse(_) => "InvalidResponse",
        }
    }

    /// Whether the failure means the credentials have gone stale
    pub fn is_not_allowed(&self) -> bool {
        matches!(self, Self::NotAllowed(_))
    }

    /// Whether the failure is a transport-level problem worth repeating
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Connection(_) | Self::Server { .. }
        )
    }
}

// ============================================================================
// TaskError
// ============================================================================

/// Errors raised while executing a single task
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// A source or destination API call failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The destination gave an answer that may succeed if asked again
    #[error("Upload negotiation inconclusive (status {status}, code {status_code})")]
    UploadAmbiguous { status: i64, status_code: i64 },

    /// Instant upload failed and the direct-upload policy forbids a fallback
    #[error("Direct upload refused for {size} byte file")]
    DirectUploadRefused { size: u64 },

    /// The destination refused the upload outright
    #[error("Upload rejected (status {status}, code {status_code}): {message}")]
    UploadRejected {
        status: i64,
        status_code: i64,
        message: String,
    },

    /// Anything else; never retried in selective mode
    #[error("{0}")]
    Unexpected(String),
}

impl TaskError {
    /// Stable name of the error kind, used as the key of the error histogram
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Api(e) => e.kind(),
            Self::UploadAmbiguous { .. } => "UploadAmbiguous",
            Self::DirectUploadRefused { .. } => "DirectUploadRefused",
            Self::UploadRejected { .. } => "UploadRejected",
            Self::Unexpected(_) => "Unexpected",
        }
    }

    /// Returns the underlying API error, if any
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(e) => Some(e),
            _ => None,
        }
    }
}
