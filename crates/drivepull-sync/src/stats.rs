//! Run statistics
//!
//! [`StatsAggregator`] keeps every counter of a pull run behind one mutex.
//! Each `record_*` method is a single critical section, so a snapshot never
//! observes half of an update.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use drivepull_core::domain::Entry;

// ============================================================================
// Counter groups
// ============================================================================

/// Task counters split by entry kind, with file bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub total: u64,
    pub files: u64,
    pub dirs: u64,
    pub size: u64,
}

impl Counts {
    fn add_entry(&mut self, is_directory: bool, size: u64) {
        self.total += 1;
        if is_directory {
            self.dirs += 1;
        } else {
            self.files += 1;
            self.size += size;
        }
    }

    fn remaining(&self, success: &Counts, failed: &Counts) -> Counts {
        Counts {
            total: self.total.saturating_sub(success.total + failed.total),
            files: self.files.saturating_sub(success.files + failed.files),
            dirs: self.dirs.saturating_sub(success.dirs + failed.dirs),
            size: self.size.saturating_sub(success.size + failed.size),
        }
    }
}

/// Retry counters split by entry kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetryCounts {
    pub total: u64,
    pub files: u64,
    pub dirs: u64,
}

/// Error counters with a histogram of error kinds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorCounts {
    pub total: u64,
    pub files: u64,
    pub dirs: u64,
    pub reasons: BTreeMap<String, u64>,
}

// ============================================================================
// StatsSnapshot
// ============================================================================

/// Consistent copy of all counters at one instant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub started_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    pub is_completed: bool,
    pub source_root: Option<Entry>,
    pub dest_root: Option<Entry>,
    pub tasks: Counts,
    pub success: Counts,
    pub failed: Counts,
    pub unfinished: Counts,
    pub retry: RetryCounts,
    pub errors: ErrorCounts,
}

fn serialize_secs<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}

impl StatsSnapshot {
    /// Whether `unfinished = tasks - success - failed` holds for every counter
    pub fn is_consistent(&self) -> bool {
        let sum = |f: fn(&Counts) -> u64| f(&self.success) + f(&self.failed) + f(&self.unfinished);
        sum(|c| c.total) == self.tasks.total
            && sum(|c| c.files) == self.tasks.files
            && sum(|c| c.dirs) == self.tasks.dirs
            && sum(|c| c.size) == self.tasks.size
    }
}

// ============================================================================
// StatsAggregator
// ============================================================================

#[derive(Debug, Default)]
struct StatsState {
    source_root: Option<Entry>,
    dest_root: Option<Entry>,
    is_completed: bool,
    tasks: Counts,
    success: Counts,
    failed: Counts,
    retry: RetryCounts,
    errors: ErrorCounts,
}

/// Lock-protected statistics of one pull run
#[derive(Debug)]
pub struct StatsAggregator {
    started_at: DateTime<Utc>,
    started: Instant,
    state: Mutex<StatsState>,
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
            state: Mutex::new(StatsState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StatsState> {
        // Counters stay meaningful even if a holder panicked mid-update.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the resolved source and destination roots
    pub fn set_roots(&self, source: Entry, dest: Entry) {
        let mut state = self.lock();
        state.source_root = Some(source);
        state.dest_root = Some(dest);
    }

    /// Accounts newly discovered tasks in one update
    ///
    /// # Arguments
    /// * `total` - Number of entries discovered
    /// * `files` - How many of them are files (the rest are directories)
    /// * `size` - Combined size of the files in bytes
    pub fn record_discovered(&self, total: u64, files: u64, size: u64) {
        let mut state = self.lock();
        state.tasks.total += total;
        state.tasks.files += files;
        state.tasks.dirs += total.saturating_sub(files);
        state.tasks.size += size;
    }

    pub fn record_succeeded(&self, is_directory: bool, size: u64) {
        self.lock().success.add_entry(is_directory, size);
    }

    pub fn record_failed(&self, is_directory: bool, size: u64) {
        self.lock().failed.add_entry(is_directory, size);
    }

    pub fn record_retried(&self, is_directory: bool) {
        let mut state = self.lock();
        state.retry.total += 1;
        if is_directory {
            state.retry.dirs += 1;
        } else {
            state.retry.files += 1;
        }
    }

    /// Counts one error occurrence and tallies its kind
    pub fn record_error(&self, kind: &str, is_directory: bool) {
        let mut state = self.lock();
        state.errors.total += 1;
        if is_directory {
            state.errors.dirs += 1;
        } else {
            state.errors.files += 1;
        }
        *state.errors.reasons.entry(kind.to_string()).or_insert(0) += 1;
    }

    /// Flags the run as having drained every task
    pub fn mark_completed(&self) {
        self.lock().is_completed = true;
    }

    /// Returns a consistent copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        let state = self.lock();
        StatsSnapshot {
            started_at: self.started_at,
            elapsed: self.started.elapsed(),
            is_completed: state.is_completed,
            source_root: state.source_root.clone(),
            dest_root: state.dest_root.clone(),
            tasks: state.tasks,
            success: state.success,
            failed: state.failed,
            unfinished: state.tasks.remaining(&state.success, &state.failed),
            retry: state.retry,
            errors: state.errors.clone(),
        }
    }
}
