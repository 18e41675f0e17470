use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::sleep_until;
use tracing::trace;

use super::QueueInner;

/// Spawn the task that drives [`QueueInner::tick`].
///
/// It wakes when the earliest armed deadline passes or when the queue is
/// notified (job added, slot freed, resumed). Only a weak reference is held
/// while waiting, so the task ends with the queue.
pub(super) fn spawn(inner: &Arc<QueueInner>) -> JoinHandle<()> {
    let queue = Arc::downgrade(inner);
    let wake = inner.wake.clone();

    inner.runtime.spawn(async move {
        loop {
            let deadline = {
                let Some(queue) = queue.upgrade() else {
                    break;
                };
                queue.tick();
                queue.next_deadline()
            };

            match deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = wake.notified() => {}
                        _ = sleep_until(deadline) => {}
                    }
                }
                None => wake.notified().await,
            }
        }
        trace!("Queue scheduler stopped");
    })
}
