//! Task store
//!
//! Id-keyed arena holding every task of a run in exactly one of three
//! partitions. Workers never hold references into the store: they receive an
//! owned copy from [`TaskStore::begin_attempt`] and report back by id.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use drivepull_core::domain::{Entry, EntryId, Task, TaskError};

/// Errors returned by [`TaskStore`] transitions
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The id is already present in some partition
    #[error("Task already registered: {0}")]
    Duplicate(EntryId),

    /// The id is not in the unfinished partition
    #[error("Task not unfinished: {0}")]
    NotUnfinished(EntryId),
}

/// Copy of all three partitions taken under one lock
#[derive(Debug, Clone, Default)]
pub struct TaskSnapshot {
    pub unfinished: HashMap<EntryId, Task>,
    pub success: HashMap<EntryId, Task>,
    pub failed: HashMap<EntryId, Task>,
}

impl TaskSnapshot {
    /// Number of tasks across all partitions
    pub fn len(&self) -> usize {
        self.unfinished.len() + self.success.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
struct Partitions {
    unfinished: HashMap<EntryId, Task>,
    success: HashMap<EntryId, Task>,
    failed: HashMap<EntryId, Task>,
}

impl Partitions {
    fn contains(&self, id: &EntryId) -> bool {
        self.unfinished.contains_key(id)
            || self.success.contains_key(id)
            || self.failed.contains_key(id)
    }

    fn unfinished_mut(&mut self, id: &EntryId) -> Result<&mut Task, StoreError> {
        self.unfinished
            .get_mut(id)
            .ok_or_else(|| StoreError::NotUnfinished(id.clone()))
    }
}

/// The unfinished / success / failed partitions of one run
#[derive(Debug, Default)]
pub struct TaskStore {
    partitions: Mutex<Partitions>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Partitions> {
        self.partitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a task to the unfinished partition
    ///
    /// # Errors
    /// Returns [`StoreError::Duplicate`] if the id is present in any partition
    pub fn put(&self, task: Task) -> Result<(), StoreError> {
        let mut parts = self.lock();
        let id = task.id().clone();
        if parts.contains(&id) {
            return Err(StoreError::Duplicate(id));
        }
        parts.unfinished.insert(id, task);
        Ok(())
    }

    /// Adds several tasks in one critical section
    ///
    /// Either all tasks are added or, if any id is already known, none is.
    pub fn put_all(&self, tasks: Vec<Task>) -> Result<(), StoreError> {
        let mut parts = self.lock();
        let mut seen = std::collections::HashSet::with_capacity(tasks.len());
        for task in &tasks {
            if parts.contains(task.id()) || !seen.insert(task.id().clone()) {
                return Err(StoreError::Duplicate(task.id().clone()));
            }
        }
        for task in tasks {
            parts.unfinished.insert(task.id().clone(), task);
        }
        Ok(())
    }

    /// Increments the attempt counter and returns an owned copy for execution
    pub fn begin_attempt(&self, id: &EntryId) -> Result<Task, StoreError> {
        let mut parts = self.lock();
        let task = parts.unfinished_mut(id)?;
        task.attempts += 1;
        Ok(task.clone())
    }

    /// Records the matched or created destination entry
    pub fn set_destination(&self, id: &EntryId, dest: Entry) -> Result<(), StoreError> {
        self.lock().unfinished_mut(id)?.dest = Some(dest);
        Ok(())
    }

    /// Appends an error to the task's failure history
    pub fn record_failure(&self, id: &EntryId, error: TaskError) -> Result<(), StoreError> {
        self.lock().unfinished_mut(id)?.failures.push(error);
        Ok(())
    }

    /// Moves a task into the success partition
    pub fn resolve_success(&self, id: &EntryId) -> Result<Task, StoreError> {
        let mut parts = self.lock();
        let task = parts
            .unfinished
            .remove(id)
            .ok_or_else(|| StoreError::NotUnfinished(id.clone()))?;
        parts.success.insert(id.clone(), task.clone());
        Ok(task)
    }

    /// Moves a task into the failed partition
    pub fn resolve_failed(&self, id: &EntryId) -> Result<Task, StoreError> {
        let mut parts = self.lock();
        let task = parts
            .unfinished
            .remove(id)
            .ok_or_else(|| StoreError::NotUnfinished(id.clone()))?;
        parts.failed.insert(id.clone(), task.clone());
        Ok(task)
    }

    /// Returns an unfinished task without touching it
    pub fn get_unfinished(&self, id: &EntryId) -> Option<Task> {
        self.lock().unfinished.get(id).cloned()
    }

    pub fn unfinished_len(&self) -> usize {
        self.lock().unfinished.len()
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        let parts = self.lock();
        TaskSnapshot {
            unfinished: parts.unfinished.clone(),
            success: parts.success.clone(),
            failed: parts.failed.clone(),
        }
    }
}
