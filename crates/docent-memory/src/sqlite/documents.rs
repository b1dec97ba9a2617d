use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{SqliteStore, now_millis};
use crate::error::MemoryError;
use crate::store::stale_cutoff;
use crate::types::{DocumentId, DocumentRecord, DocumentStatus};

type DocumentRow = (DocumentId, String, String, String, Option<String>, i64, i64);

const SELECT_DOCUMENT: &str = "SELECT d.id, d.filename, d.content_type, d.status, d.error, d.created_at, \
     (SELECT COUNT(*) FROM chunks c WHERE c.document_id = d.id) \
     FROM documents d";

fn row_to_record(row: DocumentRow) -> Result<DocumentRecord, MemoryError> {
    let (id, filename, content_type, status, error, created_at, chunk_count) = row;
    let created_at = DateTime::<Utc>::from_timestamp_millis(created_at)
        .ok_or_else(|| MemoryError::Other(format!("invalid created_at {created_at}")))?;
    Ok(DocumentRecord {
        id,
        filename,
        content_type,
        status: status.parse()?,
        error,
        chunk_count: usize::try_from(chunk_count)?,
        created_at,
    })
}

impl SqliteStore {
    /// Insert a new document in `processing` status and return its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert_document(
        &self,
        filename: &str,
        content_type: &str,
    ) -> Result<DocumentId, MemoryError> {
        let now = now_millis();
        let (id,): (DocumentId,) = sqlx::query_as(
            "INSERT INTO documents (filename, content_type, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(filename)
        .bind(content_type)
        .bind(DocumentStatus::Processing.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails or the row is malformed.
    pub async fn load_document(
        &self,
        id: DocumentId,
    ) -> Result<Option<DocumentRecord>, MemoryError> {
        let row: Option<DocumentRow> = sqlx::query_as(&format!("{SELECT_DOCUMENT} WHERE d.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_record).transpose()
    }

    /// Load every document, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is malformed.
    pub async fn load_documents(&self) -> Result<Vec<DocumentRecord>, MemoryError> {
        let rows: Vec<DocumentRow> = sqlx::query_as(&format!(
            "{SELECT_DOCUMENT} ORDER BY d.created_at DESC, d.id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_record).collect()
    }

    /// Move a `processing` document to `failed` and drop any chunks it has.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub async fn mark_failed(&self, id: DocumentId, reason: &str) -> Result<bool, MemoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE documents SET status = ?, error = ?, updated_at = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(DocumentStatus::Failed.as_str())
        .bind(reason)
        .bind(now_millis())
        .bind(id)
        .bind(DocumentStatus::Processing.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn remove_document(&self, id: DocumentId) -> Result<bool, MemoryError> {
        let deleted = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    /// Fail every document stuck in `processing` for longer than `older_than`.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn mark_stale_failed(
        &self,
        older_than: Duration,
    ) -> Result<Vec<DocumentId>, MemoryError> {
        let cutoff = stale_cutoff(older_than)?.timestamp_millis();
        let rows: Vec<(DocumentId,)> = sqlx::query_as(
            "UPDATE documents SET status = ?, error = ?, updated_at = ? \
             WHERE status = ? AND created_at < ? RETURNING id",
        )
        .bind(DocumentStatus::Failed.as_str())
        .bind("ingestion did not finish before the stale timeout")
        .bind(now_millis())
        .bind(DocumentStatus::Processing.as_str())
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}
