pub mod ids;
pub mod priority;
pub mod state;
pub mod options;
pub mod time;
pub mod record;
pub mod events;
pub mod stats;

pub use ids::JobId;
pub use priority::JobPriority;
pub use state::JobState;
pub use options::{JobOptions, QueueOptions};
pub use time::Clock;
pub use record::{Job, JobSnapshot};
pub use events::QueueEvent;
pub use stats::{QueueStats, StateCounts, ShutdownReport};
