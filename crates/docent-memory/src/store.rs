use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::MemoryError;
use crate::types::{ChunkRecord, DocumentId, DocumentRecord, NewChunk, SearchHit};

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Durable documents plus their embedded chunks.
///
/// The store is the only shared mutable resource. Status changes are guarded so a
/// document can leave `processing` exactly once; callers learn whether their
/// transition applied from the returned `bool`.
pub trait DocumentStore: Send + Sync {
    /// Insert a document in `processing` status and return its fresh identity.
    fn create_document(
        &self,
        filename: &str,
        content_type: &str,
    ) -> BoxFuture<'_, Result<DocumentId, MemoryError>>;

    fn get_document(
        &self,
        id: DocumentId,
    ) -> BoxFuture<'_, Result<Option<DocumentRecord>, MemoryError>>;

    /// All documents, newest first.
    fn list_documents(&self) -> BoxFuture<'_, Result<Vec<DocumentRecord>, MemoryError>>;

    /// Atomically write every chunk and move the document to `ready`.
    ///
    /// Returns `false` without writing anything when the document has already left
    /// `processing`.
    fn commit_chunks(
        &self,
        id: DocumentId,
        chunks: Vec<NewChunk>,
    ) -> BoxFuture<'_, Result<bool, MemoryError>>;

    /// Atomically discard any chunks of the document and move it to `failed`.
    ///
    /// Idempotent: returns `false` for documents already terminal or absent.
    fn fail_document(
        &self,
        id: DocumentId,
        reason: &str,
    ) -> BoxFuture<'_, Result<bool, MemoryError>>;

    /// Remove a document and, by cascade, its chunks. Returns `false` if absent.
    fn delete_document(&self, id: DocumentId) -> BoxFuture<'_, Result<bool, MemoryError>>;

    /// Chunks of one document in `chunk_index` order.
    fn chunks_for_document(
        &self,
        id: DocumentId,
    ) -> BoxFuture<'_, Result<Vec<ChunkRecord>, MemoryError>>;

    /// The `limit` chunks of `ready` documents nearest to `query` by cosine
    /// distance, ascending, ties by chunk id.
    fn search_nearest(
        &self,
        query: Vec<f32>,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<SearchHit>, MemoryError>>;

    /// Mark documents still `processing` after `older_than` as failed.
    fn fail_stale_documents(
        &self,
        older_than: Duration,
    ) -> BoxFuture<'_, Result<Vec<DocumentId>, MemoryError>>;
}

pub(crate) fn stale_cutoff(
    older_than: Duration,
) -> Result<chrono::DateTime<chrono::Utc>, MemoryError> {
    let delta = chrono::TimeDelta::from_std(older_than)
        .map_err(|e| MemoryError::Other(format!("stale timeout out of range: {e}")))?;
    Ok(chrono::Utc::now() - delta)
}
