pub mod registry;
pub mod context;

pub use registry::HandlerRegistry;
pub use context::JobContext;

use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;

use crate::JobError;

/// Executes jobs of one type.
///
/// The handler receives the job payload and a [`JobContext`] for progress
/// reporting. Whatever it returns is recorded as the job's result; an error
/// sends the job through the retry policy.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, data: Value, ctx: JobContext) -> Result<Value, JobError>;
}

/// Adapter running a plain async closure as a [`JobHandler`]
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(Value, JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, JobError>> + Send + 'static,
{
    async fn handle(&self, data: Value, ctx: JobContext) -> Result<Value, JobError> {
        (self.0)(data, ctx).await
    }
}
