//! # dog-jobs: In-Process Background Jobs
//!
//! Named queues that run async handlers in the background of a Tokio
//! application, with retries, timeouts and priorities.
//!
//! ## Features
//!
//! - **Priority dispatch**: higher priority first, then earliest schedule, then insertion order
//! - **Retries with exponential backoff**: 2s, 4s, 8s, ... until `max_attempts` is used up
//! - **Per-attempt timeouts**: an overrunning attempt fails without cancelling the handler
//! - **Bounded concurrency** per queue
//! - **Lifecycle events** over a broadcast channel or a `Stream`
//! - **QueueManager** holding the well-known `default`, `email`, `notifications` and `exports` queues
//!
//! ## Quick Start
//!
//! ```rust
//! use dog_jobs::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> QueueResult<()> {
//!     let manager = QueueManager::with_defaults(&ManagerConfig::default())?;
//!     let email = manager.queue("email")?;
//!
//!     email.register_fn("welcome", |data, ctx| async move {
//!         ctx.progress(50);
//!         Ok::<_, JobError>(json!({ "sent_to": data["to"] }))
//!     });
//!
//!     let mut events = email.subscribe();
//!     let job = email.add("welcome", json!({ "to": "ada@example.com" }), JobOptions::default());
//!
//!     while let Ok(event) = events.recv().await {
//!         if let QueueEvent::JobCompleted { job_id, result, .. } = event {
//!             assert_eq!(job_id, job.id);
//!             assert_eq!(result["sent_to"], "ada@example.com");
//!             break;
//!         }
//!     }
//!
//!     manager.shutdown_all(std::time::Duration::from_secs(1)).await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod job;
pub mod manager;
pub mod observability;
pub mod queue;
pub mod types;

pub use config::{ConfigStore, ManagerConfig};
pub use error::{JobError, QueueError, QueueResult, TIMEOUT_MESSAGE};
pub use job::{FnHandler, HandlerRegistry, JobContext, JobHandler};
pub use manager::{QueueManager, DEFAULT_QUEUE, EMAIL_QUEUE, EXPORTS_QUEUE, NOTIFICATIONS_QUEUE};
pub use queue::JobQueue;
pub use types::{
    Clock, Job, JobId, JobOptions, JobPriority, JobSnapshot, JobState, QueueEvent, QueueOptions,
    QueueStats, ShutdownReport, StateCounts,
};
pub use types::record::{backoff_for, BASE_BACKOFF};

#[cfg(feature = "tracing-basic")]
pub use observability::{init_tracing, LogFormat};

pub mod prelude {
    pub use crate::{
        JobContext, JobError, JobHandler, JobId, JobOptions, JobPriority, JobQueue, JobSnapshot,
        JobState, ManagerConfig, QueueEvent, QueueManager, QueueOptions, QueueResult,
    };

    pub use async_trait::async_trait;
}
