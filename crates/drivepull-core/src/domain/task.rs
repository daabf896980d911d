//! Task model
//!
//! A [`Task`] is the unit of synchronization work for one source entry. It is
//! keyed by the source entry id and moves through exactly one of the
//! unfinished, success or failed partitions of the task store.

use std::fmt;

use serde::Serialize;

use super::entry::{Entry, EntryId};
use super::errors::TaskError;

/// Unit of synchronization work for one source entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    /// Immutable snapshot of the source entry
    pub source: Entry,
    /// Destination container receiving this entry
    pub dest_parent_id: EntryId,
    /// Matched or created destination entry, once known
    pub dest: Option<Entry>,
    /// Number of executions started so far
    pub attempts: u32,
    /// Errors encountered across attempts, oldest first
    #[serde(serialize_with = "serialize_failures")]
    pub failures: Vec<TaskError>,
}

impl Task {
    /// Creates a task that has not been executed yet
    pub fn new(source: Entry, dest_parent_id: EntryId) -> Self {
        Self {
            source,
            dest_parent_id,
            dest: None,
            attempts: 0,
            failures: Vec::new(),
        }
    }

    /// Sets an already known destination entry
    pub fn with_dest(mut self, dest: Entry) -> Self {
        self.dest = Some(dest);
        self
    }

    /// Source entry id, which is also the task key
    pub fn id(&self) -> &EntryId {
        &self.source.id
    }

    /// Whether the task synchronizes a directory
    pub fn is_directory(&self) -> bool {
        self.source.is_directory
    }

    /// Composite failure for a task that is being abandoned
    ///
    /// Returns `None` when no failure was recorded.
    pub fn failure(&self) -> Option<TaskFailure> {
        TaskFailure::from_history(&self.failures)
    }
}

fn serialize_failures<S>(failures: &[TaskError], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(failures.iter().map(ToString::to_string))
}

// ============================================================================
// TaskFailure
// ============================================================================

/// Error surfaced for a permanently failed task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure {
    /// Exactly one error was recorded
    Single(TaskError),
    /// Several attempts failed; errors in the order they occurred
    Grouped(Vec<TaskError>),
}

impl TaskFailure {
    /// Builds the composite failure from an attempt history
    pub fn from_history(history: &[TaskError]) -> Option<Self> {
        match history {
            [] => None,
            [only] => Some(Self::Single(only.clone())),
            many => Some(Self::Grouped(many.to_vec())),
        }
    }

    /// The most recent error
    pub fn last(&self) -> Option<&TaskError> {
        match self {
            Self::Single(e) => Some(e),
            Self::Grouped(errors) => errors.last(),
        }
    }

    /// Number of errors carried
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Grouped(errors) => errors.len(),
        }
    }

    /// Whether no error is carried
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(e) => write!(f, "{e}"),
            Self::Grouped(errors) => {
                write!(f, "{} attempts failed", errors.len())?;
                for (i, e) in errors.iter().enumerate() {
                    write!(f, "; #{}: {e}", i + 1)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for TaskFailure {}
