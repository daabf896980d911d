//! Worker pool - bounded concurrent execution with dynamic enqueueing
//!
//! The [`WorkerPool`] keeps up to `W` task executions running on a
//! [`JoinSet`]. Every finished execution hands back the ids it wants
//! dispatched next (children of a directory, or itself for a retry), which
//! join the same queue as the seeds.
//!
//! ## Flow
//!
//! ```text
//! seeds ──→ queue ──→ JoinSet (≤ W executions) ──→ follow-up ids ──┐
//!             ↑                                                    │
//!             └────────────────────────────────────────────────────┘
//! ```
//!
//! The pool finishes when the queue is empty and nothing is in flight.
//! Cancellation stops dispatching and lets in-flight executions finish; a
//! panicking execution aborts the run the same way.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures_util::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use drivepull_core::domain::EntryId;

use crate::stats::StatsAggregator;

// ============================================================================
// TaskExecutor
// ============================================================================

/// Executes one attempt of a task on behalf of the pool
#[async_trait::async_trait]
pub trait TaskExecutor: Send + Sync + 'static {
    /// Runs the task and returns the ids to dispatch next
    async fn execute(&self, id: EntryId) -> Vec<EntryId>;

    /// Short human-readable label for progress reports
    fn describe(&self, id: &EntryId) -> String;
}

/// Bookkeeping for one running execution
#[derive(Debug, Clone)]
pub struct InFlight {
    pub label: String,
    pub started: Instant,
}

/// How the pool stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolOutcome {
    /// Every dispatched task reached a terminal state
    Drained,
    /// Cancellation stopped dispatching
    Interrupted,
    /// An execution panicked
    Aborted(String),
}

// ============================================================================
// WorkerPool
// ============================================================================

/// Bounded pool of concurrent task executions
pub struct WorkerPool {
    workers: usize,
    stats_interval: Option<Duration>,
    cancel: CancellationToken,
    in_flight: Arc<DashMap<EntryId, InFlight>>,
}

impl WorkerPool {
    /// Creates a pool
    ///
    /// # Arguments
    /// * `workers` - Maximum concurrent executions (at least 1)
    /// * `stats_interval` - Period of progress reports, `None` disables them
    /// * `cancel` - Token that stops dispatching when triggered
    pub fn new(workers: usize, stats_interval: Option<Duration>, cancel: CancellationToken) -> Self {
        Self {
            workers: workers.max(1),
            stats_interval: stats_interval.filter(|d| !d.is_zero()),
            cancel,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Currently running executions
    pub fn in_flight(&self) -> Vec<(EntryId, InFlight)> {
        self.in_flight
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    fn spawn(
        &self,
        running: &mut JoinSet<(EntryId, Result<Vec<EntryId>, String>)>,
        executor: &Arc<dyn TaskExecutor>,
        id: EntryId,
    ) {
        self.in_flight.insert(
            id.clone(),
            InFlight {
                label: executor.describe(&id),
                started: Instant::now(),
            },
        );
        let executor = Arc::clone(executor);
        running.spawn(async move {
            let result = AssertUnwindSafe(executor.execute(id.clone()))
                .catch_unwind()
                .await
                .map_err(|payload| panic_message(payload.as_ref()));
            (id, result)
        });
    }

    /// Runs until every task reached a terminal state, or until cancelled
    /// or aborted
    pub async fn run(
        &self,
        executor: Arc<dyn TaskExecutor>,
        seeds: Vec<EntryId>,
        stats: &StatsAggregator,
    ) -> PoolOutcome {
        let mut queue: VecDeque<EntryId> = seeds.into();
        let mut running = JoinSet::new();
        let mut outcome = PoolOutcome::Drained;
        let mut dispatching = true;

        let mut ticker = self.stats_interval.map(|period| {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            interval
        });

        info!(workers = self.workers, "Worker pool starting");

        loop {
            if dispatching && self.cancel.is_cancelled() {
                info!(
                    in_flight = running.len(),
                    queued = queue.len(),
                    "Cancellation requested, waiting for in-flight tasks"
                );
                dispatching = false;
                outcome = PoolOutcome::Interrupted;
            }

            while dispatching && running.len() < self.workers {
                let Some(id) = queue.pop_front() else {
                    break;
                };
                self.spawn(&mut running, &executor, id);
            }

            if running.is_empty() {
                break;
            }

            tokio::select! {
                _ = self.cancel.cancelled(), if dispatching => {
                    info!(
                        in_flight = running.len(),
                        queued = queue.len(),
                        "Cancellation requested, waiting for in-flight tasks"
                    );
                    dispatching = false;
                    outcome = PoolOutcome::Interrupted;
                }

                joined = running.join_next() => {
                    match joined {
                        Some(Ok((id, Ok(follow_ups)))) => {
                            self.in_flight.remove(&id);
                            if dispatching {
                                queue.extend(follow_ups);
                            }
                        }
                        Some(Ok((id, Err(message)))) => {
                            self.in_flight.remove(&id);
                            error!(task_id = %id, panic = %message, "Task execution panicked, aborting");
                            if !matches!(outcome, PoolOutcome::Aborted(_)) {
                                outcome = PoolOutcome::Aborted(format!("task {id} panicked: {message}"));
                            }
                            dispatching = false;
                        }
                        Some(Err(join_err)) => {
                            error!(error = %join_err, "Worker failed, aborting");
                            if !matches!(outcome, PoolOutcome::Aborted(_)) {
                                outcome = PoolOutcome::Aborted(join_err.to_string());
                            }
                            dispatching = false;
                        }
                        None => {}
                    }
                }

                _ = async {
                    match ticker.as_mut() {
                        Some(interval) => { interval.tick().await; }
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    self.report(stats, queue.len());
                }
            }
        }

        info!(outcome = ?outcome, "Worker pool stopped");
        outcome
    }

    fn report(&self, stats: &StatsAggregator, queued: usize) {
        let snap = stats.snapshot();
        info!(
            elapsed_secs = snap.elapsed.as_secs(),
            tasks = snap.tasks.total,
            success = snap.success.total,
            failed = snap.failed.total,
            unfinished = snap.unfinished.total,
            retries = snap.retry.total,
            errors = snap.errors.total,
            bytes_done = snap.success.size,
            bytes_total = snap.tasks.size,
            in_flight = self.in_flight.len(),
            queued,
            "Pull progress"
        );
        for entry in self.in_flight.iter() {
            debug!(
                task_id = %entry.key(),
                path = %entry.value().label,
                running_secs = entry.value().started.elapsed().as_secs(),
                "In flight"
            );
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
