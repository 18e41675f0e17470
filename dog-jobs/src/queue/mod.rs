//! The job queue: handler registry, job map, scheduler and dispatch.

mod dispatch;
mod scheduler;
pub(crate) mod state;

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error, info, instrument, warn};

use crate::job::{FnHandler, HandlerRegistry, JobContext, JobHandler};
use crate::observability::QueueCounters;
use crate::types::record::Disposition;
use crate::types::{
    Clock, Job, JobId, JobOptions, JobSnapshot, JobState, QueueEvent, QueueOptions, QueueStats,
    ShutdownReport,
};
use crate::{JobError, QueueError, QueueResult};

use dispatch::Attempt;
use state::QueueState;

/// Buffered events per subscriber before the slowest one starts lagging
const EVENT_CAPACITY: usize = 1024;

/// A named job queue.
///
/// Cloning is cheap; clones share the same jobs, handlers and scheduler.
/// The scheduler task stops once the last handle is dropped or
/// [`JobQueue::shutdown`] is called.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<QueueInner>,
}

pub(crate) struct QueueInner {
    name: String,
    concurrency: usize,
    clock: Clock,
    runtime: Handle,
    state: Mutex<QueueState>,
    handlers: RwLock<HandlerRegistry>,
    counters: QueueCounters,
    events: broadcast::Sender<QueueEvent>,
    wake: Arc<Notify>,
    in_flight: watch::Sender<usize>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

impl JobQueue {
    /// Create a queue and start its scheduler.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(name: impl Into<String>, options: QueueOptions) -> QueueResult<Self> {
        let runtime = Handle::try_current().map_err(|_| QueueError::NoRuntime)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (in_flight, _) = watch::channel(0);

        let inner = Arc::new(QueueInner {
            name: name.into(),
            concurrency: options.concurrency.max(1),
            clock: Clock::new(),
            runtime,
            state: Mutex::new(QueueState::default()),
            handlers: RwLock::new(HandlerRegistry::new()),
            counters: QueueCounters::new(),
            events,
            wake: Arc::new(Notify::new()),
            in_flight,
            scheduler: Mutex::new(None),
        });

        let scheduler = scheduler::spawn(&inner);
        *inner.scheduler.lock() = Some(scheduler);

        info!(queue = %inner.name, concurrency = inner.concurrency, "Queue created");
        Ok(Self { inner })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }

    pub fn is_paused(&self) -> bool {
        self.inner.state.lock().paused
    }

    /// Attempts currently holding a concurrency slot
    pub fn in_flight(&self) -> usize {
        *self.inner.in_flight.borrow()
    }

    /// Register the handler for a job type, silently replacing any previous one
    pub fn register(&self, job_type: impl Into<String>, handler: impl JobHandler) {
        let job_type = job_type.into();
        let replaced = self
            .inner
            .handlers
            .write()
            .register(job_type.clone(), Arc::new(handler));

        debug!(queue = %self.inner.name, job_type = %job_type, replaced, "Registered job handler");
        self.inner.wake.notify_one();
    }

    /// Register an async closure as the handler for a job type
    pub fn register_fn<F, Fut>(&self, job_type: impl Into<String>, handler: F)
    where
        F: Fn(Value, JobContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value, JobError>> + Send + 'static,
    {
        self.register(job_type, FnHandler(handler));
    }

    /// Job types with a registered handler
    pub fn registered_types(&self) -> Vec<String> {
        self.inner.handlers.read().registered_types()
    }

    /// Store a new job and return its snapshot; execution happens in the background
    pub fn add(&self, job_type: impl Into<String>, data: Value, options: JobOptions) -> JobSnapshot {
        let now = self.inner.clock.now();
        let job = Job::new(job_type, data, &options, now);
        let snapshot = job.snapshot(&self.inner.clock);

        self.inner.state.lock().insert(job);

        debug!(
            queue = %self.inner.name,
            job_id = %snapshot.id,
            job_type = %snapshot.job_type,
            priority = %snapshot.priority,
            delay_ms = snapshot.delay_ms,
            "Job added"
        );

        self.inner.emit(QueueEvent::JobAdded {
            queue: self.inner.name.clone(),
            job: snapshot.clone(),
            at: self.inner.clock.to_utc(now),
        });
        self.inner.wake.notify_one();

        snapshot
    }

    /// Run one selection pass; returns how many jobs left `pending`.
    ///
    /// The scheduler calls this whenever a deadline passes or the queue is
    /// woken, so callers normally never need to.
    pub fn tick(&self) -> usize {
        self.inner.tick()
    }

    pub fn get_job(&self, job_id: &JobId) -> Option<JobSnapshot> {
        self.inner
            .state
            .lock()
            .jobs
            .get(job_id)
            .map(|job| job.snapshot(&self.inner.clock))
    }

    /// Jobs in insertion order, optionally restricted to one state
    pub fn get_jobs(&self, state: Option<JobState>) -> Vec<JobSnapshot> {
        self.inner.state.lock().snapshots(state, &self.inner.clock)
    }

    /// The handler's return value for a completed job
    pub fn get_result(&self, job_id: &JobId) -> Option<Value> {
        self.inner
            .state
            .lock()
            .jobs
            .get(job_id)
            .and_then(|job| job.result.clone())
    }

    /// Re-arm a failed job with a fresh attempt budget.
    ///
    /// Returns false if the job does not exist or is not `failed`.
    #[instrument(skip(self), fields(queue = %self.inner.name))]
    pub fn retry(&self, job_id: &JobId) -> bool {
        let now = self.inner.clock.now();
        let applied = {
            let mut state = self.inner.state.lock();
            let applied = state
                .jobs
                .get_mut(job_id)
                .map_or(false, |job| job.rearm(now));
            if applied {
                state.arm(now);
            }
            applied
        };

        if applied {
            info!(queue = %self.inner.name, job_id = %job_id, "Job re-armed for retry");
            self.inner.wake.notify_one();
        }
        applied
    }

    /// Delete a job regardless of its state.
    ///
    /// A running attempt keeps its slot until it settles; its outcome is discarded.
    #[instrument(skip(self), fields(queue = %self.inner.name))]
    pub fn remove(&self, job_id: &JobId) -> bool {
        let removed = self.inner.state.lock().jobs.remove(job_id);

        match removed {
            Some(job) => {
                if job.state == JobState::Running {
                    warn!(queue = %self.inner.name, job_id = %job_id, "Removed a running job");
                }
                self.inner.emit(QueueEvent::JobRemoved {
                    queue: self.inner.name.clone(),
                    job_id: job.id,
                    at: self.inner.now_utc(),
                });
                true
            }
            None => false,
        }
    }

    /// Stop dispatching new work; running attempts continue
    pub fn pause(&self) {
        let changed = !std::mem::replace(&mut self.inner.state.lock().paused, true);
        if changed {
            info!(queue = %self.inner.name, "Queue paused");
            self.inner.emit(QueueEvent::QueuePaused {
                queue: self.inner.name.clone(),
                at: self.inner.now_utc(),
            });
        }
    }

    pub fn resume(&self) {
        let changed = std::mem::replace(&mut self.inner.state.lock().paused, false);
        if changed {
            info!(queue = %self.inner.name, "Queue resumed");
            self.inner.emit(QueueEvent::QueueResumed {
                queue: self.inner.name.clone(),
                at: self.inner.now_utc(),
            });
            self.inner.wake.notify_one();
        }
    }

    /// Delete all jobs in `state` (every job for `None`); returns how many
    pub fn clear(&self, state: Option<JobState>) -> usize {
        let removed = self.inner.state.lock().clear(state);
        info!(
            queue = %self.inner.name,
            state = state.map(JobState::name).unwrap_or("any"),
            removed,
            "Cleared jobs"
        );
        removed
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.inner.state.lock();
        QueueStats {
            name: self.inner.name.clone(),
            concurrency: self.inner.concurrency,
            paused: state.paused,
            in_flight: state.in_flight.len(),
            processed: self.inner.counters.processed(),
            completed: self.inner.counters.completed(),
            failed: self.inner.counters.failed(),
            jobs: state.counts(),
        }
    }

    /// Pause, stop the scheduler and wait up to `timeout` for in-flight attempts.
    ///
    /// Handlers are never cancelled; if one outlives the timeout the report
    /// says so and the attempt is left running.
    #[instrument(skip(self), fields(queue = %self.inner.name))]
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownReport {
        self.inner.state.lock().paused = true;
        if let Some(scheduler) = self.inner.scheduler.lock().take() {
            scheduler.abort();
        }

        let mut in_flight = self.inner.in_flight.subscribe();
        let drained = tokio::time::timeout(timeout, in_flight.wait_for(|count| *count == 0))
            .await
            .map_or(false, |waited| waited.is_ok());

        let report = ShutdownReport {
            drained,
            in_flight: *self.inner.in_flight.borrow(),
        };

        if report.drained {
            info!("Queue shut down");
        } else {
            warn!(in_flight = report.in_flight, "Queue shut down with attempts still in flight");
        }

        self.inner.emit(QueueEvent::QueueShutdown {
            queue: self.inner.name.clone(),
            drained: report.drained,
            at: self.inner.now_utc(),
        });

        report
    }

    /// Subscribe to this queue's lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.events.subscribe()
    }

    /// Lifecycle events as a stream; events missed by a lagging consumer are skipped
    pub fn event_stream(&self) -> BoxStream<'static, QueueEvent> {
        BroadcastStream::new(self.inner.events.subscribe())
            .filter_map(|item| async move { item.ok() })
            .boxed()
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("name", &self.inner.name)
            .field("concurrency", &self.inner.concurrency)
            .finish_non_exhaustive()
    }
}

impl QueueInner {
    fn emit(&self, event: QueueEvent) {
        let _ = self.events.send(event);
    }

    fn now_utc(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.to_utc(self.clock.now())
    }

    fn publish_in_flight(&self, state: &QueueState) {
        self.in_flight.send_replace(state.in_flight.len());
    }

    pub(crate) fn next_deadline(&self) -> Option<tokio::time::Instant> {
        self.state.lock().next_deadline(self.clock.now())
    }

    pub(crate) fn tick(self: &Arc<Self>) -> usize {
        let now = self.clock.now();
        let at = self.clock.to_utc(now);
        let mut attempts = Vec::new();
        let mut events = Vec::new();

        {
            let mut state = self.state.lock();
            if state.paused {
                return 0;
            }

            let mut free = self.concurrency.saturating_sub(state.in_flight.len());
            if free == 0 {
                return 0;
            }

            let handlers = self.handlers.read();
            for candidate in state.due_candidates(now) {
                if free == 0 {
                    break;
                }

                let QueueState { jobs, in_flight, .. } = &mut *state;
                let Some(job) = jobs.get_mut(&candidate.job_id) else {
                    continue;
                };

                match handlers.get(&job.job_type) {
                    None => {
                        job.fail_unhandled(now);
                        self.counters.record_failed();
                        let error = job.error.clone().unwrap_or_default();
                        error!(queue = %self.name, job_id = %job.id, "{}", error);
                        events.push(QueueEvent::JobFailed {
                            queue: self.name.clone(),
                            job_id: job.id.clone(),
                            attempts: job.attempts,
                            error,
                            at,
                        });
                    }
                    Some(handler) => {
                        let generation = job.start(now);
                        in_flight.insert(job.id.clone(), generation);
                        free -= 1;

                        events.push(QueueEvent::JobStarted {
                            queue: self.name.clone(),
                            job_id: job.id.clone(),
                            attempt: job.attempts,
                            at,
                        });
                        attempts.push(Attempt {
                            job_id: job.id.clone(),
                            job_type: job.job_type.clone(),
                            generation,
                            attempt: job.attempts,
                            data: job.data.clone(),
                            timeout: job.timeout,
                            handler,
                        });
                    }
                }
            }

            self.publish_in_flight(&state);
        }

        let moved = events.len();
        if moved > 0 {
            debug!(queue = %self.name, dispatched = attempts.len(), moved, "Tick");
        }

        for event in events {
            self.emit(event);
        }
        for attempt in attempts {
            self.runtime.spawn(dispatch::run(self.clone(), attempt));
        }

        moved
    }

    /// Apply the outcome of one attempt.
    ///
    /// Ignored unless the job still exists and is running the same generation.
    pub(crate) fn settle(&self, job_id: &JobId, generation: u64, outcome: Result<Value, JobError>) {
        let now = self.clock.now();
        let at = self.clock.to_utc(now);

        let event = {
            let mut state = self.state.lock();
            if state.release_slot(job_id, generation) {
                self.publish_in_flight(&state);
            }

            let current = state
                .jobs
                .get_mut(job_id)
                .filter(|job| job.state == JobState::Running && job.generation == generation);

            match current {
                None => {
                    debug!(
                        queue = %self.name,
                        job_id = %job_id,
                        generation,
                        "Discarding outcome of an attempt that no longer owns its job"
                    );
                    None
                }
                Some(job) => match outcome {
                    Ok(result) => {
                        job.complete(result.clone(), now);
                        self.counters.record_completed();
                        info!(queue = %self.name, job_id = %job_id, attempts = job.attempts, "Job completed");
                        Some(QueueEvent::JobCompleted {
                            queue: self.name.clone(),
                            job_id: job_id.clone(),
                            result,
                            at,
                        })
                    }
                    Err(err) => {
                        let error = err.into_message();
                        let attempt = job.attempts;
                        match job.fail_attempt(error.clone(), now) {
                            Disposition::Retry { retry_at } => {
                                warn!(
                                    queue = %self.name,
                                    job_id = %job_id,
                                    attempt,
                                    max_attempts = job.max_attempts,
                                    error = %error,
                                    "Job attempt failed, retrying"
                                );
                                state.arm(retry_at);
                                Some(QueueEvent::JobRetry {
                                    queue: self.name.clone(),
                                    job_id: job_id.clone(),
                                    attempt,
                                    error,
                                    retry_at: self.clock.to_utc(retry_at),
                                    at,
                                })
                            }
                            Disposition::Failed => {
                                self.counters.record_failed();
                                error!(
                                    queue = %self.name,
                                    job_id = %job_id,
                                    attempts = attempt,
                                    error = %error,
                                    "Job failed permanently"
                                );
                                Some(QueueEvent::JobFailed {
                                    queue: self.name.clone(),
                                    job_id: job_id.clone(),
                                    attempts: attempt,
                                    error,
                                    at,
                                })
                            }
                        }
                    }
                },
            }
        };

        if let Some(event) = event {
            self.emit(event);
        }
        self.wake.notify_one();
    }

    pub(crate) fn report_progress(&self, job_id: &JobId, generation: u64, progress: u8) {
        let event = {
            let mut state = self.state.lock();
            match state.jobs.get_mut(job_id) {
                Some(job) if job.state == JobState::Running && job.generation == generation => {
                    job.progress = progress;
                    Some(QueueEvent::JobProgress {
                        queue: self.name.clone(),
                        job_id: job_id.clone(),
                        progress,
                        at: self.now_utc(),
                    })
                }
                _ => None,
            }
        };

        match event {
            Some(event) => self.emit(event),
            None => debug!(queue = %self.name, job_id = %job_id, "Dropped stale progress report"),
        }
    }
}

impl Drop for QueueInner {
    fn drop(&mut self) {
        if let Some(scheduler) = self.scheduler.get_mut().take() {
            scheduler.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Render;

    #[async_trait]
    impl JobHandler for Render {
        async fn handle(&self, data: Value, ctx: JobContext) -> Result<Value, JobError> {
            ctx.progress(50);
            let template = data["template"].as_str().ok_or("missing template")?;
            Ok(json!({ "rendered": template }))
        }
    }

    #[test]
    fn test_new_requires_runtime() {
        let err = JobQueue::new("orphan", QueueOptions::default()).unwrap_err();
        assert_eq!(err, QueueError::NoRuntime);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trait_handler_runs_to_completion() {
        let queue = JobQueue::new("render", QueueOptions::default().with_concurrency(0)).unwrap();
        assert_eq!(queue.concurrency(), 1);

        queue.register("render", Render);
        assert_eq!(queue.registered_types(), vec!["render"]);

        let mut events = queue.subscribe();
        let ok = queue.add("render", json!({ "template": "welcome" }), JobOptions::default());
        let bad = queue.add("render", json!({}), JobOptions::default().with_max_attempts(1));

        let mut failed = None;
        let mut completed = None;
        while failed.is_none() || completed.is_none() {
            match events.recv().await.unwrap() {
                QueueEvent::JobCompleted { job_id, .. } => completed = Some(job_id),
                QueueEvent::JobFailed { job_id, error, .. } => failed = Some((job_id, error)),
                _ => {}
            }
        }

        assert_eq!(completed, Some(ok.id.clone()));
        assert_eq!(failed, Some((bad.id, "missing template".to_string())));
        assert_eq!(queue.get_result(&ok.id), Some(json!({ "rendered": "welcome" })));

        let stats = queue.stats();
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.jobs.completed, 1);
        assert_eq!(stats.jobs.failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_attempt_does_not_keep_queue_alive() {
        let queue = JobQueue::new("stuck", QueueOptions::default()).unwrap();
        queue.register_fn("hang", |_data, _ctx| {
            futures::future::pending::<Result<Value, JobError>>()
        });
        let mut events = queue.subscribe();

        queue.add(
            "hang",
            json!({}),
            JobOptions::default()
                .with_timeout(Duration::from_secs(1))
                .with_max_attempts(1),
        );
        while !matches!(events.recv().await.unwrap(), QueueEvent::JobFailed { .. }) {}

        // Act: drop the last handle while the handler is still pending
        let inner = Arc::downgrade(&queue.inner);
        drop(queue);
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(inner.upgrade().is_none());
    }
}
