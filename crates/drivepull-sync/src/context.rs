//! Shared collaborators of one pull run

use std::sync::Arc;

use drivepull_core::ports::{DestinationApi, SourceApi};

use crate::reauth::ReauthCoordinator;
use crate::retry::RetryPolicy;
use crate::stats::StatsAggregator;
use crate::store::TaskStore;
use crate::transfer::DirectUploadPolicy;

/// Everything a task execution needs, shared by all workers
#[derive(Clone)]
pub struct SyncContext {
    pub source: Arc<dyn SourceApi>,
    pub destination: Arc<dyn DestinationApi>,
    pub reauth: Arc<ReauthCoordinator>,
    pub store: Arc<TaskStore>,
    pub stats: Arc<StatsAggregator>,
    pub retry: RetryPolicy,
    pub upload_policy: DirectUploadPolicy,
}

impl SyncContext {
    /// Creates a context with an empty task store and fresh statistics
    pub fn new(
        source: Arc<dyn SourceApi>,
        destination: Arc<dyn DestinationApi>,
        reauth: Arc<ReauthCoordinator>,
        retry: RetryPolicy,
        upload_policy: DirectUploadPolicy,
    ) -> Self {
        Self {
            source,
            destination,
            reauth,
            store: Arc::new(TaskStore::new()),
            stats: Arc::new(StatsAggregator::new()),
            retry,
            upload_policy,
        }
    }
}
