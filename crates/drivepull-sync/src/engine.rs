//! Pull engine
//!
//! The [`PullEngine`] resolves the source root and the destination target,
//! seeds the task store with one root task and runs the worker pool until
//! the tree is drained, the run is cancelled, or an execution panics.
//!
//! ## Pull Flow
//!
//! 1. **Resolve**: source root by id or path; destination target by id, or
//!    by path (created component by component when missing)
//! 2. **Seed**: one directory task (merge, or a named subdirectory looked up
//!    before it is created) or one file task
//! 3. **Run**: bounded worker pool over the dynamically growing task set
//! 4. **Report**: final statistics plus the task partitions

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use drivepull_core::config::Config;
use drivepull_core::domain::{ApiError, Entry, EntryId, EntryRef, Task, TaskFailure};
use drivepull_core::ports::{DestinationApi, SourceApi};

use crate::context::SyncContext;
use crate::directory::find_or_create_directory;
use crate::reauth::ReauthCoordinator;
use crate::retry::RetryPolicy;
use crate::runner::TaskRunner;
use crate::scheduler::{PoolOutcome, TaskExecutor, WorkerPool};
use crate::stats::StatsSnapshot;
use crate::store::TaskSnapshot;
use crate::transfer::DirectUploadPolicy;
use crate::SyncError;

// ============================================================================
// PullOptions
// ============================================================================

/// Parameters of one pull run
#[derive(Debug, Clone)]
pub struct PullOptions {
    /// Source entry to pull: id, path, or empty for the root
    pub push: String,
    /// Destination directory receiving the tree: id, path, or empty for the root
    pub to: String,
    pub source_root_id: EntryId,
    pub destination_root_id: EntryId,
    /// Merge the source root's children into the target instead of
    /// creating a directory named after the source root
    pub no_root: bool,
    pub max_workers: usize,
    pub retry: RetryPolicy,
    pub upload_policy: DirectUploadPolicy,
    pub stats_interval: Option<Duration>,
}

impl PullOptions {
    /// Derives run parameters from the configuration
    ///
    /// # Errors
    /// Returns [`SyncError::InvalidConfig`] when the destination root id is unusable
    pub fn from_config(
        config: &Config,
        push: impl Into<String>,
        to: impl Into<String>,
    ) -> Result<Self, SyncError> {
        let destination_root_id = EntryId::new(config.destination.root_id.clone())
            .map_err(|e| SyncError::InvalidConfig(e.to_string()))?;
        let transfer = &config.transfer;
        Ok(Self {
            push: push.into(),
            to: to.into(),
            source_root_id: EntryId::from(0),
            destination_root_id,
            no_root: transfer.no_root,
            max_workers: transfer.max_workers.max(1),
            retry: RetryPolicy::from_max_retries(transfer.max_retries),
            upload_policy: DirectUploadPolicy::from_limit(transfer.direct_upload_max_size),
            stats_interval: (transfer.stats_interval_secs > 0)
                .then(|| Duration::from_secs(transfer.stats_interval_secs)),
        })
    }
}

// ============================================================================
// PullReport
// ============================================================================

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every task reached a terminal state
    Completed,
    /// Cancelled before the tree was drained
    Interrupted,
    /// A task execution panicked
    Aborted(String),
}

/// A permanently failed task
#[derive(Debug, Clone)]
pub struct FailedTask {
    pub id: EntryId,
    pub path: String,
    pub attempts: u32,
    pub failure: Option<TaskFailure>,
}

/// Final result of a run
#[derive(Debug, Clone)]
pub struct PullReport {
    pub stats: StatsSnapshot,
    pub tasks: TaskSnapshot,
    pub outcome: RunOutcome,
}

impl PullReport {
    /// Failed tasks ordered by path
    pub fn failures(&self) -> Vec<FailedTask> {
        let mut failed: Vec<FailedTask> = self
            .tasks
            .failed
            .values()
            .map(|task| FailedTask {
                id: task.id().clone(),
                path: task.source.path.clone(),
                attempts: task.attempts,
                failure: task.failure(),
            })
            .collect();
        failed.sort_by(|a, b| a.path.cmp(&b.path));
        failed
    }

    /// Completed with no failed task
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Completed && self.stats.failed.total == 0
    }

    /// Turns an aborted run into [`SyncError::Aborted`]
    pub fn into_result(self) -> Result<Self, SyncError> {
        match &self.outcome {
            RunOutcome::Aborted(reason) => Err(SyncError::Aborted(reason.clone())),
            _ => Ok(self),
        }
    }
}

// ============================================================================
// PullEngine
// ============================================================================

/// Pulls one source tree into one destination directory
pub struct PullEngine {
    source: Arc<dyn SourceApi>,
    destination: Arc<dyn DestinationApi>,
    reauth: Arc<ReauthCoordinator>,
    options: PullOptions,
}

impl PullEngine {
    pub fn new(
        source: Arc<dyn SourceApi>,
        destination: Arc<dyn DestinationApi>,
        reauth: Arc<ReauthCoordinator>,
        options: PullOptions,
    ) -> Self {
        Self {
            source,
            destination,
            reauth,
            options,
        }
    }

    pub fn options(&self) -> &PullOptions {
        &self.options
    }

    /// Runs the pull to completion, cancellation, or abort
    ///
    /// # Errors
    /// Fails only when the source root or the destination target cannot be
    /// resolved. Task failures are reported in the returned [`PullReport`].
    #[tracing::instrument(skip(self, cancel), fields(push = %self.options.push, to = %self.options.to))]
    pub async fn run(&self, cancel: CancellationToken) -> Result<PullReport, SyncError> {
        let ctx = SyncContext::new(
            Arc::clone(&self.source),
            Arc::clone(&self.destination),
            Arc::clone(&self.reauth),
            self.options.retry,
            self.options.upload_policy,
        );

        let source_root = self.resolve_source().await?;
        let target = self.resolve_target(&ctx).await?;

        info!(
            source_id = %source_root.id,
            source_path = %source_root.path,
            target_id = %target.id,
            target_path = %target.path,
            workers = self.options.max_workers,
            "Starting pull"
        );

        let seed = self.seed_task(&ctx, &source_root, &target).await?;
        ctx.stats.set_roots(source_root.clone(), target);
        ctx.stats.record_discovered(
            1,
            u64::from(!source_root.is_directory),
            source_root.accounted_size(),
        );
        let seed_id = seed.id().clone();
        ctx.store.put(seed)?;

        let runner = TaskRunner::new(ctx.clone());
        let executor: Arc<dyn TaskExecutor> = Arc::new(runner);
        let pool = WorkerPool::new(self.options.max_workers, self.options.stats_interval, cancel);
        let pool_outcome = pool.run(executor, vec![seed_id], &ctx.stats).await;

        let outcome = match pool_outcome {
            PoolOutcome::Drained => {
                ctx.stats.mark_completed();
                RunOutcome::Completed
            }
            PoolOutcome::Interrupted => RunOutcome::Interrupted,
            PoolOutcome::Aborted(reason) => RunOutcome::Aborted(reason),
        };

        let stats = ctx.stats.snapshot();
        info!(
            outcome = ?outcome,
            elapsed_secs = stats.elapsed.as_secs_f64(),
            tasks = stats.tasks.total,
            success = stats.success.total,
            failed = stats.failed.total,
            unfinished = stats.unfinished.total,
            retries = stats.retry.total,
            errors = stats.errors.total,
            bytes = stats.success.size,
            reauths = self.reauth.reauth_count(),
            "Pull finished"
        );

        Ok(PullReport {
            stats,
            tasks: ctx.store.snapshot(),
            outcome,
        })
    }

    async fn resolve_source(&self) -> Result<Entry, SyncError> {
        let reference = EntryRef::parse(&self.options.push, &self.options.source_root_id);
        self.source
            .attr(&reference)
            .await
            .map_err(|source| SyncError::SourceRoot {
                reference: reference.to_string(),
                source,
            })
    }

    async fn resolve_target(&self, ctx: &SyncContext) -> Result<Entry, SyncError> {
        let root_id = &self.options.destination_root_id;
        let reference = EntryRef::parse(&self.options.to, root_id);
        let target_err = |source: ApiError| SyncError::DestinationTarget {
            reference: reference.to_string(),
            source,
        };

        let found = ctx
            .reauth
            .guarded("attr", || ctx.destination.attr(&reference))
            .await;

        let target = match (found, &reference) {
            (Ok(entry), _) => entry,
            (Err(ApiError::NotFound(_)), EntryRef::Path(path)) => {
                self.make_path(ctx, root_id, path).await.map_err(target_err)?
            }
            (Err(e), _) => return Err(target_err(e)),
        };

        if !target.is_directory {
            return Err(SyncError::NotADirectory(reference.to_string()));
        }
        Ok(target)
    }

    /// Creates every missing component of `path` below the root
    async fn make_path(
        &self,
        ctx: &SyncContext,
        root_id: &EntryId,
        path: &str,
    ) -> Result<Entry, ApiError> {
        let root_ref = EntryRef::Id(root_id.clone());
        let mut current = ctx
            .reauth
            .guarded("attr", || ctx.destination.attr(&root_ref))
            .await?;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            let (dir, created) = find_or_create_directory(ctx, component, &current.id).await?;
            if created {
                info!(name = component, id = %dir.id, "Created destination directory");
            }
            current = dir;
        }
        Ok(current)
    }

    /// Builds the root task, resolving the named root directory up front
    async fn seed_task(
        &self,
        ctx: &SyncContext,
        source_root: &Entry,
        target: &Entry,
    ) -> Result<Task, SyncError> {
        if !source_root.is_directory {
            return Ok(Task::new(source_root.clone(), target.id.clone()));
        }

        let merge = self.options.no_root || source_root.name.is_empty();
        if merge {
            if !self.options.no_root {
                warn!("Source root has no name, merging its children into the target");
            }
            let parent = target.parent_id.clone().unwrap_or_else(|| target.id.clone());
            return Ok(Task::new(source_root.clone(), parent).with_dest(target.clone()));
        }

        let (dir, created) = find_or_create_directory(ctx, &source_root.name, &target.id)
            .await
            .map_err(|source| SyncError::DestinationTarget {
                reference: format!("{}/{}", target.path, source_root.name),
                source,
            })?;
        if created {
            info!(name = %source_root.name, id = %dir.id, "Created destination directory");
        }
        Ok(Task::new(source_root.clone(), target.id.clone()).with_dest(dir))
    }
}
