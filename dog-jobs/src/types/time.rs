use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Anchors the monotonic clock used for scheduling to wall-clock time.
///
/// Scheduling decisions use [`Instant`] so they follow Tokio's clock (and its
/// paused test clock); snapshots report the equivalent UTC timestamps.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
    origin_utc: DateTime<Utc>,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            origin_utc: Utc::now(),
        }
    }

    /// Current monotonic time
    pub fn now(&self) -> Instant {
        Instant::now()
    }

    /// Convert a monotonic instant to wall-clock time
    pub fn to_utc(&self, at: Instant) -> DateTime<Utc> {
        if at >= self.origin {
            self.origin_utc + to_chrono(at - self.origin)
        } else {
            self.origin_utc - to_chrono(self.origin - at)
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

fn to_chrono(duration: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::max_value())
}

/// Whole milliseconds, saturating at `u64::MAX`
pub(crate) fn saturating_millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// An instant far enough ahead to mean "never"
pub(crate) fn far_future(now: Instant) -> Instant {
    now + std::time::Duration::from_secs(86400 * 365 * 30)
}
