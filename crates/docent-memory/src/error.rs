use crate::types::DocumentId;

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("database error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("integer conversion: {0}")]
    IntConversion(#[from] std::num::TryFromIntError),

    #[error("invalid embedding: {0}")]
    InvalidEmbedding(String),

    #[error("invalid document status: {0}")]
    InvalidStatus(String),

    #[error("document {0} not found")]
    DocumentNotFound(DocumentId),

    #[error("{0}")]
    Other(String),
}
