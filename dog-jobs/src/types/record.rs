use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;

use super::time::{far_future, saturating_millis};
use super::{Clock, JobId, JobOptions, JobPriority, JobState};

/// Base unit of the retry backoff: `2^attempts * BASE_BACKOFF`
pub const BASE_BACKOFF: Duration = Duration::from_millis(1000);

/// Where a failed attempt sends the job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    /// Re-armed as pending, eligible again at `retry_at`
    Retry { retry_at: Instant },
    /// Attempts exhausted
    Failed,
}

/// Backoff inserted after the given number of consumed attempts
pub fn backoff_for(attempts: u32) -> Duration {
    let factor = 1u32.checked_shl(attempts).unwrap_or(u32::MAX);
    BASE_BACKOFF.saturating_mul(factor)
}

/// One schedulable unit of work and its history.
///
/// Owned by exactly one queue; callers only ever see [`JobSnapshot`]s.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub job_type: String,
    pub data: Value,
    pub state: JobState,
    pub priority: JobPriority,
    pub attempts: u32,
    pub max_attempts: u32,
    pub delay: Duration,
    pub timeout: Duration,
    pub created_at: Instant,
    /// Authoritative earliest dispatch time
    pub scheduled_at: Instant,
    pub started_at: Option<Instant>,
    pub completed_at: Option<Instant>,
    pub error: Option<String>,
    pub result: Option<Value>,
    pub progress: u8,
    /// Bumped on every dispatch; settlements from older attempts are ignored
    pub(crate) generation: u64,
    /// Insertion order within the owning queue
    pub(crate) seq: u64,
}

impl Job {
    /// Create a pending job
    pub fn new(job_type: impl Into<String>, data: Value, options: &JobOptions, now: Instant) -> Self {
        let job_type = job_type.into();

        Self {
            id: JobId::generate(&job_type),
            job_type,
            data,
            state: JobState::Pending,
            priority: options.priority,
            attempts: 0,
            max_attempts: options.max_attempts.max(1),
            delay: options.delay,
            timeout: options.timeout,
            created_at: now,
            scheduled_at: now.checked_add(options.delay).unwrap_or_else(|| far_future(now)),
            started_at: None,
            completed_at: None,
            error: None,
            result: None,
            progress: 0,
            generation: 0,
            seq: 0,
        }
    }

    /// Pending and due at `now`
    pub fn is_due(&self, now: Instant) -> bool {
        self.state == JobState::Pending && self.scheduled_at <= now
    }

    pub(crate) fn start(&mut self, now: Instant) -> u64 {
        self.state = JobState::Running;
        self.started_at = Some(now);
        self.attempts += 1;
        self.generation += 1;
        self.generation
    }

    pub(crate) fn complete(&mut self, result: Value, now: Instant) {
        self.state = JobState::Completed;
        self.result = Some(result);
        self.progress = 100;
        self.completed_at = Some(now);
    }

    /// Terminal failure that never reached a handler
    pub(crate) fn fail_unhandled(&mut self, now: Instant) {
        self.state = JobState::Failed;
        self.error = Some(format!("No handler registered for job type: {}", self.job_type));
        self.completed_at = Some(now);
    }

    /// Record a failed attempt and apply the retry policy
    pub(crate) fn fail_attempt(&mut self, error: String, now: Instant) -> Disposition {
        self.error = Some(error);

        if self.attempts < self.max_attempts {
            let retry_at = now
                .checked_add(backoff_for(self.attempts))
                .unwrap_or_else(|| far_future(now));
            self.state = JobState::Pending;
            self.scheduled_at = retry_at;
            Disposition::Retry { retry_at }
        } else {
            self.state = JobState::Failed;
            self.completed_at = Some(now);
            Disposition::Failed
        }
    }

    /// Manual re-arm of a failed job; returns false for any other state
    pub(crate) fn rearm(&mut self, now: Instant) -> bool {
        if self.state != JobState::Failed {
            return false;
        }

        self.state = JobState::Pending;
        self.attempts = 0;
        self.error = None;
        self.progress = 0;
        self.scheduled_at = now;
        self.completed_at = None;
        true
    }

    /// Projection of everything except `data` and `result`
    pub fn snapshot(&self, clock: &Clock) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            job_type: self.job_type.clone(),
            state: self.state,
            priority: self.priority,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            delay_ms: saturating_millis(self.delay),
            timeout_ms: saturating_millis(self.timeout),
            created_at: clock.to_utc(self.created_at),
            scheduled_at: clock.to_utc(self.scheduled_at),
            started_at: self.started_at.map(|at| clock.to_utc(at)),
            completed_at: self.completed_at.map(|at| clock.to_utc(at)),
            error: self.error.clone(),
            progress: self.progress,
        }
    }
}

/// Status view of a job, safe to list, log and serialize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub id: JobId,
    #[serde(rename = "type")]
    pub job_type: String,
    pub state: JobState,
    pub priority: JobPriority,
    pub attempts: u32,
    pub max_attempts: u32,
    pub delay_ms: u64,
    pub timeout_ms: u64,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub progress: u8,
}
