use std::sync::atomic::{AtomicU64, Ordering};

/// Cumulative outcome counters for one queue
#[derive(Debug, Default)]
pub struct QueueCounters {
    processed: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl QueueCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processed_tracks_both_outcomes() {
        let counters = QueueCounters::new();
        counters.record_completed();
        counters.record_completed();
        counters.record_failed();

        assert_eq!(counters.completed(), 2);
        assert_eq!(counters.failed(), 1);
        assert_eq!(counters.processed(), 3);
    }
}
