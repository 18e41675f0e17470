use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinError;
use tracing::{debug, warn};

use super::QueueInner;
use crate::job::{JobContext, JobHandler};
use crate::types::time::saturating_millis;
use crate::{JobError, JobId};

/// One dispatched execution of a job
pub(super) struct Attempt {
    pub job_id: JobId,
    pub job_type: String,
    pub generation: u64,
    pub attempt: u32,
    pub data: Value,
    pub timeout: Duration,
    pub handler: Arc<dyn JobHandler>,
}

enum Finished {
    InTime(Result<Value, JobError>),
    TimedOut,
}

/// Run the handler in its own task and settle the attempt.
///
/// On timeout the attempt is settled as failed right away. The handler keeps
/// running; its late outcome is still offered to the queue and ignored there.
pub(super) async fn run(queue: Arc<QueueInner>, attempt: Attempt) {
    let Attempt {
        job_id,
        job_type,
        generation,
        attempt,
        data,
        timeout,
        handler,
    } = attempt;

    debug!(queue = %queue.name, job_id = %job_id, job_type = %job_type, attempt, "Running job");

    let ctx = JobContext::new(job_id.clone(), attempt, progress_reporter(&queue, &job_id, generation));
    let mut execution = queue
        .runtime
        .spawn(async move { handler.handle(data, ctx).await });

    let finished = tokio::select! {
        joined = &mut execution => Finished::InTime(flatten(joined)),
        _ = tokio::time::sleep(timeout) => Finished::TimedOut,
    };

    match finished {
        Finished::InTime(outcome) => queue.settle(&job_id, generation, outcome),
        Finished::TimedOut => {
            warn!(
                queue = %queue.name,
                job_id = %job_id,
                timeout_ms = saturating_millis(timeout),
                "Job attempt timed out"
            );
            queue.settle(&job_id, generation, Err(JobError::timed_out()));

            // Only a weak reference may outlive the timeout
            let weak = Arc::downgrade(&queue);
            drop(queue);

            let late = execution.await;
            if let Some(queue) = weak.upgrade() {
                queue.settle(&job_id, generation, flatten(late));
            }
        }
    }
}

fn progress_reporter(
    queue: &Arc<QueueInner>,
    job_id: &JobId,
    generation: u64,
) -> Arc<dyn Fn(u8) + Send + Sync> {
    let queue = Arc::downgrade(queue);
    let job_id = job_id.clone();
    Arc::new(move |progress| {
        if let Some(queue) = queue.upgrade() {
            queue.report_progress(&job_id, generation, progress);
        }
    })
}

fn flatten(joined: Result<Result<Value, JobError>, JoinError>) -> Result<Value, JobError> {
    match joined {
        Ok(outcome) => outcome,
        Err(err) if err.is_panic() => Err(JobError::new(format!(
            "handler panicked: {}",
            panic_message(err.into_panic())
        ))),
        Err(_) => Err(JobError::new("handler task was cancelled")),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map(|message| message.to_string())
            .unwrap_or_else(|| "unknown panic".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_panics_become_job_errors() {
        let joined = tokio::spawn(async {
            if true {
                panic!("template missing");
            }
            Ok::<_, JobError>(Value::Null)
        })
        .await;

        let err = flatten(joined).unwrap_err();
        assert_eq!(err.message(), "handler panicked: template missing");
    }

    #[test]
    fn test_panic_message_formats() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(7_u8)), "unknown panic");
    }
}
