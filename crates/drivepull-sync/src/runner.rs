//! Task execution
//!
//! [`TaskRunner`] executes one attempt of a task, settles the outcome in the
//! task store and statistics, and tells the worker pool what to dispatch
//! next: discovered children, the task itself for a retry, or nothing.

use tracing::{debug, error, warn};

use drivepull_core::domain::{EntryId, Task, TaskError};

use crate::context::SyncContext;
use crate::directory::sync_directory;
use crate::reauth::EpochSample;
use crate::retry::RetryDecision;
use crate::scheduler::TaskExecutor;
use crate::transfer::{transfer_file, Transferred};

pub struct TaskRunner {
    ctx: SyncContext,
}

impl TaskRunner {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    fn on_success(&self, task: &Task, follow_ups: Vec<EntryId>) -> Vec<EntryId> {
        if let Err(e) = self.ctx.store.resolve_success(task.id()) {
            warn!(task_id = %task.id(), error = %e, "Failed to settle task");
            return Vec::new();
        }
        self.ctx
            .stats
            .record_succeeded(task.is_directory(), task.source.accounted_size());
        follow_ups
    }

    async fn on_failure(&self, task: &Task, err: TaskError, sampled: EpochSample) -> Vec<EntryId> {
        let id = task.id();
        let is_dir = task.is_directory();

        self.ctx.stats.record_error(err.kind(), is_dir);
        if let Err(e) = self.ctx.store.record_failure(id, err.clone()) {
            warn!(task_id = %id, error = %e, "Failed to record task failure");
            return Vec::new();
        }

        match self.ctx.retry.classify(&err, task.attempts) {
            RetryDecision::Retry { reauthenticate } => {
                if reauthenticate {
                    if let Err(reauth_err) = self.ctx.reauth.refresh(sampled).await {
                        warn!(task_id = %id, error = %reauth_err, "Reauthentication failed");
                    }
                }
                self.ctx.stats.record_retried(is_dir);
                warn!(
                    task_id = %id,
                    path = %task.source.path,
                    attempt = task.attempts,
                    error = %err,
                    "Task failed, retrying"
                );
                vec![id.clone()]
            }
            RetryDecision::Fatal => {
                match self.ctx.store.resolve_failed(id) {
                    Ok(failed) => {
                        self.ctx
                            .stats
                            .record_failed(is_dir, task.source.accounted_size());
                        let failure = failed
                            .failure()
                            .map(|f| f.to_string())
                            .unwrap_or_else(|| err.to_string());
                        error!(
                            task_id = %id,
                            path = %task.source.path,
                            attempts = task.attempts,
                            failure = %failure,
                            "Task failed permanently"
                        );
                    }
                    Err(e) => warn!(task_id = %id, error = %e, "Failed to settle task"),
                }
                Vec::new()
            }
        }
    }
}

#[async_trait::async_trait]
impl TaskExecutor for TaskRunner {
    async fn execute(&self, id: EntryId) -> Vec<EntryId> {
        let sampled = self.ctx.reauth.sample();
        let task = match self.ctx.store.begin_attempt(&id) {
            Ok(task) => task,
            Err(e) => {
                warn!(task_id = %id, error = %e, "Dropping dispatch of unknown task");
                return Vec::new();
            }
        };

        let result = if task.is_directory() {
            sync_directory(&self.ctx, &task).await
        } else {
            transfer_file(&self.ctx, &task).await.map(|how| {
                match how {
                    Transferred::Instant => {
                        debug!(task_id = %id, path = %task.source.path, "File transferred by hash")
                    }
                    Transferred::Direct(entry) => {
                        debug!(task_id = %id, dest_id = %entry.id, "File uploaded")
                    }
                }
                Vec::new()
            })
        };

        match result {
            Ok(follow_ups) => self.on_success(&task, follow_ups),
            Err(err) => self.on_failure(&task, err, sampled).await,
        }
    }

    fn describe(&self, id: &EntryId) -> String {
        self.ctx
            .store
            .get_unfinished(id)
            .map(|t| t.source.path)
            .unwrap_or_default()
    }
}
