use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{JobId, JobSnapshot};

/// Lifecycle events emitted by a queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    /// Job was stored and will be picked up once due
    JobAdded {
        queue: String,
        job: JobSnapshot,
        at: DateTime<Utc>,
    },

    /// An attempt was handed to the job's handler
    JobStarted {
        queue: String,
        job_id: JobId,
        attempt: u32,
        at: DateTime<Utc>,
    },

    /// The handler reported progress
    JobProgress {
        queue: String,
        job_id: JobId,
        progress: u8,
        at: DateTime<Utc>,
    },

    /// Job completed successfully
    JobCompleted {
        queue: String,
        job_id: JobId,
        result: Value,
        at: DateTime<Utc>,
    },

    /// Attempt failed and the job was re-armed with backoff
    JobRetry {
        queue: String,
        job_id: JobId,
        attempt: u32,
        error: String,
        retry_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },

    /// Job failed permanently
    JobFailed {
        queue: String,
        job_id: JobId,
        attempts: u32,
        error: String,
        at: DateTime<Utc>,
    },

    /// Job was removed from the queue
    JobRemoved {
        queue: String,
        job_id: JobId,
        at: DateTime<Utc>,
    },

    QueuePaused {
        queue: String,
        at: DateTime<Utc>,
    },

    QueueResumed {
        queue: String,
        at: DateTime<Utc>,
    },

    /// Shutdown finished, with or without a full drain
    QueueShutdown {
        queue: String,
        drained: bool,
        at: DateTime<Utc>,
    },
}

impl QueueEvent {
    /// Get the dotted event name
    pub fn name(&self) -> &'static str {
        match self {
            Self::JobAdded { .. } => "job.added",
            Self::JobStarted { .. } => "job.started",
            Self::JobProgress { .. } => "job.progress",
            Self::JobCompleted { .. } => "job.completed",
            Self::JobRetry { .. } => "job.retry",
            Self::JobFailed { .. } => "job.failed",
            Self::JobRemoved { .. } => "job.removed",
            Self::QueuePaused { .. } => "queue.paused",
            Self::QueueResumed { .. } => "queue.resumed",
            Self::QueueShutdown { .. } => "queue.shutdown",
        }
    }

    /// Get the name of the queue that emitted the event
    pub fn queue(&self) -> &str {
        match self {
            Self::JobAdded { queue, .. }
            | Self::JobStarted { queue, .. }
            | Self::JobProgress { queue, .. }
            | Self::JobCompleted { queue, .. }
            | Self::JobRetry { queue, .. }
            | Self::JobFailed { queue, .. }
            | Self::JobRemoved { queue, .. }
            | Self::QueuePaused { queue, .. }
            | Self::QueueResumed { queue, .. }
            | Self::QueueShutdown { queue, .. } => queue,
        }
    }

    /// Get the job ID for job-level events
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Self::JobAdded { job, .. } => Some(&job.id),
            Self::JobStarted { job_id, .. }
            | Self::JobProgress { job_id, .. }
            | Self::JobCompleted { job_id, .. }
            | Self::JobRetry { job_id, .. }
            | Self::JobFailed { job_id, .. }
            | Self::JobRemoved { job_id, .. } => Some(job_id),
            Self::QueuePaused { .. } | Self::QueueResumed { .. } | Self::QueueShutdown { .. } => None,
        }
    }

    /// Get the timestamp from any event
    pub fn timestamp(&self) -> &DateTime<Utc> {
        match self {
            Self::JobAdded { at, .. }
            | Self::JobStarted { at, .. }
            | Self::JobProgress { at, .. }
            | Self::JobCompleted { at, .. }
            | Self::JobRetry { at, .. }
            | Self::JobFailed { at, .. }
            | Self::JobRemoved { at, .. }
            | Self::QueuePaused { at, .. }
            | Self::QueueResumed { at, .. }
            | Self::QueueShutdown { at, .. } => at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_tag() {
        let event = QueueEvent::JobRemoved {
            queue: "exports".to_string(),
            job_id: JobId::from("export-1-abc"),
            at: Utc::now(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "job_removed");
        assert_eq!(value["job_id"], "export-1-abc");
        assert_eq!(event.name(), "job.removed");
        assert_eq!(event.queue(), "exports");
        assert_eq!(event.job_id().map(JobId::as_str), Some("export-1-abc"));
    }
}
