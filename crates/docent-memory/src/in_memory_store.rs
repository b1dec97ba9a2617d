use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::MemoryError;
use crate::store::{BoxFuture, DocumentStore, stale_cutoff};
use crate::types::{
    ChunkId, ChunkRecord, DocumentId, DocumentRecord, DocumentStatus, NewChunk, SearchHit,
};
use crate::vector::{cosine_distance, rank};

struct StoredDocument {
    filename: String,
    content_type: String,
    status: DocumentStatus,
    error: Option<String>,
    created_at: DateTime<Utc>,
    chunks: Vec<ChunkRecord>,
}

impl StoredDocument {
    fn to_record(&self, id: DocumentId) -> DocumentRecord {
        DocumentRecord {
            id,
            filename: self.filename.clone(),
            content_type: self.content_type.clone(),
            status: self.status,
            error: self.error.clone(),
            chunk_count: self.chunks.len(),
            created_at: self.created_at,
        }
    }
}

#[derive(Default)]
struct Inner {
    next_document_id: i64,
    next_chunk_id: i64,
    documents: BTreeMap<DocumentId, StoredDocument>,
}

/// Process-local [`DocumentStore`] used by tests and throwaway sessions.
///
/// Follows the same transition rules as the `SQLite` store; every mutation
/// happens under a single write lock, so commits are atomic.
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish_non_exhaustive()
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> MemoryError {
    MemoryError::Other(format!("in-memory store lock poisoned: {e}"))
}

impl DocumentStore for InMemoryStore {
    fn create_document(
        &self,
        filename: &str,
        content_type: &str,
    ) -> BoxFuture<'_, Result<DocumentId, MemoryError>> {
        let filename = filename.to_owned();
        let content_type = content_type.to_owned();
        Box::pin(async move {
            let mut inner = self.inner.write().map_err(poisoned)?;
            inner.next_document_id += 1;
            let id = DocumentId(inner.next_document_id);
            inner.documents.insert(
                id,
                StoredDocument {
                    filename,
                    content_type,
                    status: DocumentStatus::Processing,
                    error: None,
                    created_at: Utc::now(),
                    chunks: Vec::new(),
                },
            );
            Ok(id)
        })
    }

    fn get_document(
        &self,
        id: DocumentId,
    ) -> BoxFuture<'_, Result<Option<DocumentRecord>, MemoryError>> {
        Box::pin(async move {
            let inner = self.inner.read().map_err(poisoned)?;
            Ok(inner.documents.get(&id).map(|d| d.to_record(id)))
        })
    }

    fn list_documents(&self) -> BoxFuture<'_, Result<Vec<DocumentRecord>, MemoryError>> {
        Box::pin(async move {
            let inner = self.inner.read().map_err(poisoned)?;
            let mut docs: Vec<DocumentRecord> = inner
                .documents
                .iter()
                .map(|(id, d)| d.to_record(*id))
                .collect();
            docs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(docs)
        })
    }

    fn commit_chunks(
        &self,
        id: DocumentId,
        chunks: Vec<NewChunk>,
    ) -> BoxFuture<'_, Result<bool, MemoryError>> {
        Box::pin(async move {
            let mut inner = self.inner.write().map_err(poisoned)?;
            let status = inner
                .documents
                .get(&id)
                .map(|d| d.status)
                .ok_or(MemoryError::DocumentNotFound(id))?;
            if status != DocumentStatus::Processing {
                return Ok(false);
            }

            let mut seen = std::collections::HashSet::new();
            for chunk in &chunks {
                if chunk.embedding.is_empty() {
                    return Err(MemoryError::InvalidEmbedding(format!(
                        "chunk {} of document {id} has an empty embedding",
                        chunk.chunk_index
                    )));
                }
                if !seen.insert(chunk.chunk_index) {
                    return Err(MemoryError::Other(format!(
                        "duplicate chunk index {} for document {id}",
                        chunk.chunk_index
                    )));
                }
            }

            let mut records = Vec::with_capacity(chunks.len());
            for chunk in chunks {
                inner.next_chunk_id += 1;
                records.push(ChunkRecord {
                    id: ChunkId(inner.next_chunk_id),
                    document_id: id,
                    chunk_index: chunk.chunk_index,
                    content: chunk.content,
                    embedding: chunk.embedding,
                });
            }
            records.sort_by_key(|c| c.chunk_index);

            if let Some(doc) = inner.documents.get_mut(&id) {
                doc.chunks = records;
                doc.status = DocumentStatus::Ready;
            }
            Ok(true)
        })
    }

    fn fail_document(
        &self,
        id: DocumentId,
        reason: &str,
    ) -> BoxFuture<'_, Result<bool, MemoryError>> {
        let reason = reason.to_owned();
        Box::pin(async move {
            let mut inner = self.inner.write().map_err(poisoned)?;
            match inner.documents.get_mut(&id) {
                Some(doc) if doc.status == DocumentStatus::Processing => {
                    doc.status = DocumentStatus::Failed;
                    doc.error = Some(reason);
                    doc.chunks.clear();
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    fn delete_document(&self, id: DocumentId) -> BoxFuture<'_, Result<bool, MemoryError>> {
        Box::pin(async move {
            let mut inner = self.inner.write().map_err(poisoned)?;
            Ok(inner.documents.remove(&id).is_some())
        })
    }

    fn chunks_for_document(
        &self,
        id: DocumentId,
    ) -> BoxFuture<'_, Result<Vec<ChunkRecord>, MemoryError>> {
        Box::pin(async move {
            let inner = self.inner.read().map_err(poisoned)?;
            Ok(inner
                .documents
                .get(&id)
                .map(|d| d.chunks.clone())
                .unwrap_or_default())
        })
    }

    fn search_nearest(
        &self,
        query: Vec<f32>,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<SearchHit>, MemoryError>> {
        Box::pin(async move {
            if limit == 0 || query.is_empty() {
                return Ok(Vec::new());
            }
            let inner = self.inner.read().map_err(poisoned)?;
            let mut hits: Vec<SearchHit> = inner
                .documents
                .values()
                .filter(|d| d.status == DocumentStatus::Ready)
                .flat_map(|d| {
                    d.chunks
                        .iter()
                        .filter(|c| c.embedding.len() == query.len())
                        .map(|c| SearchHit {
                            chunk_id: c.id,
                            document_id: c.document_id,
                            filename: d.filename.clone(),
                            chunk_index: c.chunk_index,
                            content: c.content.clone(),
                            distance: cosine_distance(&query, &c.embedding),
                        })
                })
                .collect();
            rank(&mut hits, limit);
            Ok(hits)
        })
    }

    fn fail_stale_documents(
        &self,
        older_than: Duration,
    ) -> BoxFuture<'_, Result<Vec<DocumentId>, MemoryError>> {
        Box::pin(async move {
            let cutoff = stale_cutoff(older_than)?;
            let mut inner = self.inner.write().map_err(poisoned)?;
            let mut failed = Vec::new();
            for (id, doc) in &mut inner.documents {
                if doc.status == DocumentStatus::Processing && doc.created_at < cutoff {
                    doc.status = DocumentStatus::Failed;
                    doc.error = Some("ingestion did not finish before the stale timeout".into());
                    doc.chunks.clear();
                    failed.push(*id);
                }
            }
            Ok(failed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, content: &str, embedding: Vec<f32>) -> NewChunk {
        NewChunk {
            chunk_index: index,
            content: content.to_owned(),
            embedding,
        }
    }

    #[tokio::test]
    async fn create_and_get() {
        let store = InMemoryStore::new();
        let id = store.create_document("a.txt", "text/plain").await.unwrap();
        let doc = store.get_document(id).await.unwrap().unwrap();
        assert_eq!(doc.filename, "a.txt");
        assert_eq!(doc.status, DocumentStatus::Processing);
    }

    #[tokio::test]
    async fn commit_then_search() {
        let store = InMemoryStore::new();
        let id = store.create_document("a.txt", "text/plain").await.unwrap();
        let applied = store
            .commit_chunks(
                id,
                vec![
                    chunk(1, "second", vec![0.0, 1.0]),
                    chunk(0, "first", vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();
        assert!(applied);

        let chunks = store.chunks_for_document(id).await.unwrap();
        assert_eq!(chunks[0].content, "first");

        let hits = store.search_nearest(vec![1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "first");
    }

    #[tokio::test]
    async fn processing_documents_are_not_searchable() {
        let store = InMemoryStore::new();
        store.create_document("a.txt", "text/plain").await.unwrap();
        assert!(store.search_nearest(vec![1.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fail_is_terminal() {
        let store = InMemoryStore::new();
        let id = store.create_document("a.txt", "text/plain").await.unwrap();
        assert!(store.fail_document(id, "nope").await.unwrap());
        assert!(!store.fail_document(id, "again").await.unwrap());
        assert!(!store.commit_chunks(id, vec![chunk(0, "x", vec![1.0])]).await.unwrap());
        let doc = store.get_document(id).await.unwrap().unwrap();
        assert_eq!(doc.error.as_deref(), Some("nope"));
        assert_eq!(doc.chunk_count, 0);
    }

    #[tokio::test]
    async fn duplicate_index_leaves_document_untouched() {
        let store = InMemoryStore::new();
        let id = store.create_document("a.txt", "text/plain").await.unwrap();
        let result = store
            .commit_chunks(id, vec![chunk(0, "a", vec![1.0]), chunk(0, "b", vec![1.0])])
            .await;
        assert!(result.is_err());
        let doc = store.get_document(id).await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Processing);
        assert_eq!(doc.chunk_count, 0);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = InMemoryStore::new();
        let a = store.create_document("a", "text/plain").await.unwrap();
        let b = store.create_document("b", "text/plain").await.unwrap();
        let ids: Vec<_> = store
            .list_documents()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![b, a]);
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let store = InMemoryStore::new();
        let id = store.create_document("a", "text/plain").await.unwrap();
        assert!(store.delete_document(id).await.unwrap());
        assert!(!store.delete_document(id).await.unwrap());
    }

    #[tokio::test]
    async fn stale_sweep_skips_recent() {
        let store = InMemoryStore::new();
        store.create_document("a", "text/plain").await.unwrap();
        let failed = store
            .fail_stale_documents(Duration::from_secs(60))
            .await
            .unwrap();
        assert!(failed.is_empty());
    }

    #[tokio::test]
    async fn stale_sweep_with_zero_timeout_fails_processing() {
        let store = InMemoryStore::new();
        let id = store.create_document("a", "text/plain").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let failed = store.fail_stale_documents(Duration::ZERO).await.unwrap();
        assert_eq!(failed, vec![id]);
    }
}
