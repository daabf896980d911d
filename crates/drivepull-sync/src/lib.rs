//! drivepull sync - Concurrent pull engine
//!
//! Provides:
//! - Bounded worker pool over a dynamically growing task set
//! - Retry classification with selective, never and bounded modes
//! - Single-flight reauthentication shared by all workers
//! - Idempotent directory merge and hash-first file transfer
//!
//! ## Modules
//!
//! - [`engine`] - Root resolution, seeding and the final report
//! - [`scheduler`] - Worker pool
//! - [`runner`] - One task attempt, settled into store and statistics
//! - [`directory`] / [`transfer`] - The per-entry algorithms
//! - [`reauth`] - Credential refresh and guarded destination calls
//! - [`retry`] - Retry decisions
//! - [`store`] / [`stats`] - Task partitions and run counters

pub mod context;
pub mod directory;
pub mod engine;
pub mod reauth;
pub mod retry;
pub mod runner;
pub mod scheduler;
pub mod stats;
pub mod store;
pub mod transfer;

use drivepull_core::domain::ApiError;
use thiserror::Error;

pub use engine::{FailedTask, PullEngine, PullOptions, PullReport, RunOutcome};
pub use reauth::ReauthCoordinator;
pub use store::StoreError;

/// Errors that end a pull run
#[derive(Debug, Error)]
pub enum SyncError {
    /// The source root could not be fetched
    #[error("Cannot resolve source root {reference}: {source}")]
    SourceRoot {
        reference: String,
        #[source]
        source: ApiError,
    },

    /// The destination target could not be fetched or created
    #[error("Cannot resolve destination target {reference}: {source}")]
    DestinationTarget {
        reference: String,
        #[source]
        source: ApiError,
    },

    /// The destination target exists but is a file
    #[error("Destination target is not a directory: {0}")]
    NotADirectory(String),

    /// Unusable run parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A task store transition was rejected
    #[error("Task store error: {0}")]
    Store(#[from] StoreError),

    /// A task execution panicked
    #[error("Run aborted: {0}")]
    Aborted(String),
}
