//! Error types for task tracing.

/// Error type for task operations
pub type Result<T> = std::result::Result<T, TaskError>;

/// Errors that can occur while tracing a task
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Units consumed or reported for a type that was never expected
    #[error("unknown unit type: {0}")]
    UnknownUnit(String),

    /// Invalid log sink or task configuration
    #[error("misconfigured task: {0}")]
    Config(String),

    /// Writing a rendered line to the sink failed
    #[error("log sink error: {0}")]
    Sink(#[source] std::io::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A record could not be turned back into a task
    #[error("invalid task record: {0}")]
    InvalidRecord(String),
}
