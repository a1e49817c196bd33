use thiserror::Error;

/// Failure of a slow-query sink. The monitor counts and drops these; they never
/// reach the caller of `record`.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("slow query log write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("no tokio runtime available to deliver the notification")]
    NoRuntime,

    #[error("sink rejected event: {0}")]
    Rejected(String),
}
