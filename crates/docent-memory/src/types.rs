use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::MemoryError;

/// Strongly typed wrapper for document row IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type)]
#[sqlx(transparent)]
pub struct DocumentId(pub i64);

/// Strongly typed wrapper for chunk row IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type)]
#[sqlx(transparent)]
pub struct ChunkId(pub i64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Document lifecycle: `processing → {ready, failed}`. Both outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentStatus {
    Processing,
    Ready,
    Failed,
}

impl DocumentStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Processing)
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "ready" => Ok(Self::Ready),
            "failed" => Ok(Self::Failed),
            other => Err(MemoryError::InvalidStatus(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub filename: String,
    pub content_type: String,
    pub status: DocumentStatus,
    /// Reason recorded when the document moved to `failed`.
    pub error: Option<String>,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub chunk_index: usize,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// A chunk staged by the ingestion pipeline, not yet visible to search.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChunk {
    pub chunk_index: usize,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// A nearest-neighbour result; smaller distance means more similar.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub filename: String,
    pub chunk_index: usize,
    pub content: String,
    pub distance: f32,
}
