use serde::{Deserialize, Serialize};

use super::JobState;

/// Live count of jobs per state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub retry: usize,
}

impl StateCounts {
    pub(crate) fn record(&mut self, state: JobState) {
        match state {
            JobState::Pending => self.pending += 1,
            JobState::Running => self.running += 1,
            JobState::Completed => self.completed += 1,
            JobState::Failed => self.failed += 1,
            JobState::Retry => self.retry += 1,
        }
    }

    /// Total number of jobs held by the queue
    pub fn total(&self) -> usize {
        self.pending + self.running + self.completed + self.failed + self.retry
    }
}

/// Point-in-time statistics for one queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub name: String,
    pub concurrency: usize,
    pub paused: bool,
    /// Attempts currently holding a concurrency slot
    pub in_flight: usize,
    /// Jobs that reached a terminal state since the queue was created
    pub processed: u64,
    pub completed: u64,
    pub failed: u64,
    /// Jobs currently held, by state
    pub jobs: StateCounts,
}

/// Outcome of draining a queue on shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReport {
    /// Every in-flight attempt settled before the timeout
    pub drained: bool,
    /// Attempts still in flight when shutdown returned
    pub in_flight: usize,
}
