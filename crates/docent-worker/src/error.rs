use docent_memory::DocumentError;
use thiserror::Error;

use crate::job::TaskId;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// The upload itself is unacceptable; retrying cannot help.
    #[error("upload rejected: {0}")]
    Rejected(DocumentError),
    #[error("job queue closed")]
    QueueClosed,
    #[error("job handler failed: {0}")]
    Handler(String),
    #[error("task {0} not found")]
    NotFound(TaskId),
    #[error("invalid job status: {0}")]
    InvalidStatus(String),
}

impl WorkerError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Handler(_))
    }
}
