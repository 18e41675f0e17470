#![allow(dead_code)]

use std::time::Duration;

use dog_jobs::{JobQueue, QueueEvent, QueueOptions};
use tokio::sync::broadcast;

/// Queue with the given concurrency, inside the current runtime
pub fn queue_with(concurrency: usize) -> JobQueue {
    JobQueue::new("test", QueueOptions::default().with_concurrency(concurrency))
        .expect("queue requires a runtime")
}

/// Wait (in virtual time) for the first event matching `pred`
pub async fn next_matching<F>(events: &mut broadcast::Receiver<QueueEvent>, mut pred: F) -> QueueEvent
where
    F: FnMut(&QueueEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(600), async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("Timeout waiting for event")
}

pub fn is_completed(event: &QueueEvent) -> bool {
    matches!(event, QueueEvent::JobCompleted { .. })
}

pub fn is_failed(event: &QueueEvent) -> bool {
    matches!(event, QueueEvent::JobFailed { .. })
}

pub fn is_started(event: &QueueEvent) -> bool {
    matches!(event, QueueEvent::JobStarted { .. })
}
