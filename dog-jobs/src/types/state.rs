use serde::{Deserialize, Serialize};

/// Job lifecycle state.
///
/// `pending -> running -> {completed | pending (retry) | failed}`. A job
/// re-armed for a retry goes back to `pending` with a later `scheduled_at`.
/// `Retry` is part of the state vocabulary for listings and `clear`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Retry,
}

impl JobState {
    pub fn all() -> &'static [JobState] {
        &[
            Self::Pending,
            Self::Running,
            Self::Completed,
            Self::Failed,
            Self::Retry,
        ]
    }

    /// Check if the job is in a terminal state (completed or failed)
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Get the state name as a string
    pub fn name(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Retry => "retry",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|state| state.name() == s.to_lowercase())
            .ok_or_else(|| format!("Invalid job state: {}", s))
    }
}
