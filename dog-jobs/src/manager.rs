//! Registry of named queues owned by the host application.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use futures::future::join_all;
use parking_lot::RwLock;
use tracing::{debug, info, instrument};

use crate::config::{ManagerConfig, DEFAULT_SHUTDOWN_TIMEOUT};
use crate::{JobQueue, QueueError, QueueOptions, QueueResult, QueueStats, ShutdownReport};

pub const DEFAULT_QUEUE: &str = "default";
pub const EMAIL_QUEUE: &str = "email";
pub const NOTIFICATIONS_QUEUE: &str = "notifications";
pub const EXPORTS_QUEUE: &str = "exports";

/// Named collection of [`JobQueue`]s.
///
/// Build one at startup and share it; queues are looked up by name.
pub struct QueueManager {
    queues: RwLock<HashMap<String, JobQueue>>,
    shutdown_timeout: Duration,
}

impl Default for QueueManager {
    fn default() -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl QueueManager {
    /// An empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// A manager pre-populated with every queue in `config`
    pub fn with_defaults(config: &ManagerConfig) -> QueueResult<Self> {
        let manager = Self {
            shutdown_timeout: config.shutdown_timeout,
            ..Self::new()
        };
        for (name, options) in &config.queues {
            manager.create_queue(name.clone(), options.clone())?;
        }
        info!(queues = config.queues.len(), "Queue manager initialized");
        Ok(manager)
    }

    /// Create a queue under `name`, replacing any queue already registered there.
    ///
    /// A replaced queue is only forgotten; callers still holding it keep it running.
    pub fn create_queue(&self, name: impl Into<String>, options: QueueOptions) -> QueueResult<JobQueue> {
        let name = name.into();
        let queue = JobQueue::new(name.clone(), options)?;

        if self.queues.write().insert(name.clone(), queue.clone()).is_some() {
            debug!(queue = %name, "Replaced existing queue");
        }
        Ok(queue)
    }

    pub fn get_queue(&self, name: &str) -> Option<JobQueue> {
        self.queues.read().get(name).cloned()
    }

    /// Like [`QueueManager::get_queue`] but fails with [`QueueError::QueueNotFound`]
    pub fn queue(&self, name: &str) -> QueueResult<JobQueue> {
        self.get_queue(name)
            .ok_or_else(|| QueueError::QueueNotFound(name.to_string()))
    }

    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.queues.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn all_stats(&self) -> BTreeMap<String, QueueStats> {
        self.snapshot()
            .into_iter()
            .map(|(name, queue)| (name, queue.stats()))
            .collect()
    }

    /// Drain budget used by [`QueueManager::shutdown`]
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// [`QueueManager::shutdown_all`] with the configured budget
    pub async fn shutdown(&self) -> BTreeMap<String, ShutdownReport> {
        self.shutdown_all(self.shutdown_timeout).await
    }

    /// Shut every queue down concurrently, each with the same `timeout`
    #[instrument(skip(self))]
    pub async fn shutdown_all(&self, timeout: Duration) -> BTreeMap<String, ShutdownReport> {
        let queues = self.snapshot();
        let reports = join_all(queues.iter().map(|(_, queue)| queue.shutdown(timeout))).await;

        let reports: BTreeMap<String, ShutdownReport> = queues
            .into_iter()
            .map(|(name, _)| name)
            .zip(reports)
            .collect();

        info!(
            queues = reports.len(),
            drained = reports.values().filter(|r| r.drained).count(),
            "All queues shut down"
        );
        reports
    }

    fn snapshot(&self) -> Vec<(String, JobQueue)> {
        self.queues
            .read()
            .iter()
            .map(|(name, queue)| (name.clone(), queue.clone()))
            .collect()
    }
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("queues", &self.queue_names())
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}
