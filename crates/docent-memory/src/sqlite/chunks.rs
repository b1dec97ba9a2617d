use super::{SqliteStore, now_millis};
use crate::error::MemoryError;
use crate::types::{ChunkId, ChunkRecord, DocumentId, DocumentStatus, NewChunk, SearchHit};
use crate::vector::{cosine_distance, decode_embedding, encode_embedding, rank};

impl SqliteStore {
    /// Persist every chunk of a document and flip it to `ready` in one transaction.
    ///
    /// The status update runs first so the write lock is taken before any read;
    /// when the document is no longer `processing` nothing is written and
    /// `Ok(false)` is returned.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::DocumentNotFound`] if the document does not exist, or
    /// a database error if the transaction fails. On error no chunk is visible.
    pub async fn insert_chunks_and_finalize(
        &self,
        id: DocumentId,
        chunks: Vec<NewChunk>,
    ) -> Result<bool, MemoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE documents SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(DocumentStatus::Ready.as_str())
        .bind(now_millis())
        .bind(id)
        .bind(DocumentStatus::Processing.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM documents WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;
            return match exists {
                Some(_) => Ok(false),
                None => Err(MemoryError::DocumentNotFound(id)),
            };
        }

        for chunk in &chunks {
            if chunk.embedding.is_empty() {
                return Err(MemoryError::InvalidEmbedding(format!(
                    "chunk {} of document {id} has an empty embedding",
                    chunk.chunk_index
                )));
            }
            sqlx::query(
                "INSERT INTO chunks (document_id, chunk_index, content, dimensions, embedding) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(i64::try_from(chunk.chunk_index)?)
            .bind(&chunk.content)
            .bind(i64::try_from(chunk.embedding.len())?)
            .bind(encode_embedding(&chunk.embedding))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!(document_id = %id, chunks = chunks.len(), "committed chunks");
        Ok(true)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails or a stored embedding is corrupt.
    pub async fn load_chunks(&self, id: DocumentId) -> Result<Vec<ChunkRecord>, MemoryError> {
        let rows: Vec<(ChunkId, i64, String, Vec<u8>)> = sqlx::query_as(
            "SELECT id, chunk_index, content, embedding FROM chunks \
             WHERE document_id = ? ORDER BY chunk_index",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(chunk_id, chunk_index, content, blob)| {
                Ok(ChunkRecord {
                    id: chunk_id,
                    document_id: id,
                    chunk_index: usize::try_from(chunk_index)?,
                    content,
                    embedding: decode_embedding(&blob)?,
                })
            })
            .collect()
    }

    /// Brute-force cosine scan over the chunks of `ready` documents.
    ///
    /// Only chunks whose stored dimension equals the query's are considered.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored embedding is corrupt.
    pub async fn nearest_chunks(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>, MemoryError> {
        if limit == 0 || query.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<(ChunkId, DocumentId, String, i64, String, Vec<u8>)> = sqlx::query_as(
            "SELECT c.id, c.document_id, d.filename, c.chunk_index, c.content, c.embedding \
             FROM chunks c JOIN documents d ON d.id = c.document_id \
             WHERE d.status = ? AND c.dimensions = ?",
        )
        .bind(DocumentStatus::Ready.as_str())
        .bind(i64::try_from(query.len())?)
        .fetch_all(&self.pool)
        .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for (chunk_id, document_id, filename, chunk_index, content, blob) in rows {
            let embedding = decode_embedding(&blob)?;
            hits.push(SearchHit {
                chunk_id,
                document_id,
                filename,
                chunk_index: usize::try_from(chunk_index)?,
                content,
                distance: cosine_distance(query, &embedding),
            });
        }

        rank(&mut hits, limit);
        Ok(hits)
    }
}
