pub mod metrics;

#[cfg(feature = "tracing-basic")]
pub mod tracing;

pub use metrics::QueueCounters;

#[cfg(feature = "tracing-basic")]
pub use self::tracing::{init_tracing, LogFormat};
