use thiserror::Error;

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Message recorded on a job whose attempt outlived its timeout
pub const TIMEOUT_MESSAGE: &str = "Job timed out";

/// Infrastructure errors for queue and manager operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    #[error("No Tokio runtime available to drive the queue scheduler")]
    NoRuntime,

    #[error("Invalid configuration value for {key}: {value:?}")]
    InvalidConfig { key: String, value: String },

    #[error("Observability setup failed: {0}")]
    Observability(String),
}

/// Error returned by a job handler.
///
/// Every handler error is retryable until the job's `max_attempts` is used up;
/// the message ends up in the job's `error` field verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct JobError {
    message: String,
}

impl JobError {
    /// Create a job error with the given message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub(crate) fn timed_out() -> Self {
        Self::new(TIMEOUT_MESSAGE)
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn into_message(self) -> String {
        self.message
    }
}

impl From<String> for JobError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for JobError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for JobError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("Invalid job payload: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_error_keeps_message_verbatim() {
        let err = JobError::from("smtp relay refused connection");
        assert_eq!(err.message(), "smtp relay refused connection");
        assert_eq!(err.to_string(), "smtp relay refused connection");
        assert_eq!(JobError::timed_out().into_message(), TIMEOUT_MESSAGE);
    }

    #[test]
    fn test_payload_errors_convert() {
        let parse: Result<u32, _> = serde_json::from_str::<u32>("\"nope\"");
        let err: JobError = parse.unwrap_err().into();
        assert!(err.message().starts_with("Invalid job payload"));
    }
}
