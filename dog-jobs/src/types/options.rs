use std::time::Duration;

use super::JobPriority;

/// Attempts allowed when a job does not ask for a specific number
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Per-attempt wall-clock limit when a job does not set one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Simultaneous running jobs for a queue created with default options
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Per-job scheduling options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOptions {
    /// Dispatch priority (higher first)
    pub priority: JobPriority,

    /// Offset from creation before the job becomes eligible
    pub delay: Duration,

    /// Maximum number of executions, at least 1
    pub max_attempts: u32,

    /// Maximum duration of a single attempt
    pub timeout: Duration,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            priority: JobPriority::default(),
            delay: Duration::ZERO,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl JobOptions {
    /// Set the job priority
    pub fn with_priority(mut self, priority: impl Into<JobPriority>) -> Self {
        self.priority = priority.into();
        self
    }

    /// Delay the first dispatch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the maximum number of attempts (clamped to at least 1)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Options for a single queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueOptions {
    /// Maximum number of simultaneously running jobs, at least 1
    pub concurrency: usize,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl QueueOptions {
    /// Set the concurrency limit (clamped to at least 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_defaults() {
        let options = JobOptions::default();
        assert_eq!(options.priority, JobPriority::NORMAL);
        assert_eq!(options.delay, Duration::ZERO);
        assert_eq!(options.max_attempts, 3);
        assert_eq!(options.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_builders_clamp_degenerate_values() {
        assert_eq!(JobOptions::default().with_max_attempts(0).max_attempts, 1);
        assert_eq!(QueueOptions::default().with_concurrency(0).concurrency, 1);
    }
}
