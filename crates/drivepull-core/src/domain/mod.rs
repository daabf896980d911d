//! Domain entities
//!
//! - Entries and identifiers shared by both filesystems
//! - Tasks and their composite failures
//! - Error categories for API calls and task execution

pub mod entry;
pub mod errors;
pub mod task;

pub use entry::{Entry, EntryId, EntryRef};
pub use errors::{ApiError, DomainError, TaskError};
pub use task::{Task, TaskFailure};
