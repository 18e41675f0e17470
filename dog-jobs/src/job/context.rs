use std::fmt;
use std::sync::Arc;

use crate::JobId;

type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Handle given to a running handler
#[derive(Clone)]
pub struct JobContext {
    job_id: JobId,
    attempt: u32,
    report: ProgressFn,
}

impl JobContext {
    pub(crate) fn new(job_id: JobId, attempt: u32, report: ProgressFn) -> Self {
        Self {
            job_id,
            attempt,
            report,
        }
    }

    /// Context that is not attached to a queue; progress reports go nowhere.
    ///
    /// Useful for exercising handlers directly.
    pub fn detached(job_id: JobId) -> Self {
        Self::new(job_id, 1, Arc::new(|_| {}))
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// 1-based attempt number
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Report progress in percent, clamped to 0..=100.
    ///
    /// Reports arriving after the attempt stopped running are dropped.
    pub fn progress(&self, percent: i64) {
        (self.report)(percent.clamp(0, 100) as u8);
    }
}

impl fmt::Debug for JobContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobContext")
            .field("job_id", &self.job_id)
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}
