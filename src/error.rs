//! Error types for deputy.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from the remote platform client.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("Authentication rejected by the platform")]
    AuthFailed,

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Request to {endpoint} failed with status {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Connection lost: {reason}")]
    Disconnected { reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from worker task submission.
///
/// Every variant is recovered by the offload gateway (by falling back to
/// the primary session or surfacing a failed outcome); none of them
/// crosses the gateway as a panic or retry loop.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Worker {id} is not running")]
    NotRunning { id: usize },

    #[error("No running worker available")]
    NoWorkerAvailable,

    #[error("Failed to submit task to worker {id}: {reason}")]
    SubmissionFailed { id: usize, reason: String },

    #[error("Task on worker {id} timed out after {limit:?}")]
    Timeout { id: usize, limit: Duration },

    #[error("Task on worker {id} failed: {source}")]
    TaskFailed {
        id: usize,
        #[source]
        source: PlatformError,
    },
}

impl WorkerError {
    /// True when the underlying task may have started executing on the
    /// worker's loop despite the failed outcome seen by the caller.
    pub fn task_may_have_run(&self) -> bool {
        matches!(
            self,
            WorkerError::Timeout { .. } | WorkerError::TaskFailed { .. }
        )
    }
}

/// Result type alias for deputy.
pub type Result<T> = std::result::Result<T, Error>;
