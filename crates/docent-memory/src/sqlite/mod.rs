mod chunks;
mod documents;

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::MemoryError;
use crate::store::{BoxFuture, DocumentStore};
use crate::types::{ChunkRecord, DocumentId, DocumentRecord, NewChunk, SearchHit};

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the `SQLite` database and run migrations.
    ///
    /// Enables foreign key constraints at connection level so that deleting a
    /// document cascades to its chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub async fn new(path: &str) -> Result<Self, MemoryError> {
        let in_memory = path == ":memory:";
        let url = if in_memory {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let opts = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(10))
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let mut pool_opts = SqlitePoolOptions::new().max_connections(5);
        if in_memory {
            // each in-memory connection is a separate database; keep exactly one alive
            pool_opts = pool_opts
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_opts.connect_with(opts).await?;

        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// Expose the underlying pool for shared access by other stores.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run all migrations on the given pool.
    ///
    /// # Errors
    ///
    /// Returns an error if any migration fails.
    pub async fn run_migrations(pool: &SqlitePool) -> Result<(), MemoryError> {
        sqlx::migrate!("../../migrations").run(pool).await?;
        Ok(())
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl DocumentStore for SqliteStore {
    fn create_document(
        &self,
        filename: &str,
        content_type: &str,
    ) -> BoxFuture<'_, Result<DocumentId, MemoryError>> {
        let filename = filename.to_owned();
        let content_type = content_type.to_owned();
        Box::pin(async move { self.insert_document(&filename, &content_type).await })
    }

    fn get_document(
        &self,
        id: DocumentId,
    ) -> BoxFuture<'_, Result<Option<DocumentRecord>, MemoryError>> {
        Box::pin(self.load_document(id))
    }

    fn list_documents(&self) -> BoxFuture<'_, Result<Vec<DocumentRecord>, MemoryError>> {
        Box::pin(self.load_documents())
    }

    fn commit_chunks(
        &self,
        id: DocumentId,
        chunks: Vec<NewChunk>,
    ) -> BoxFuture<'_, Result<bool, MemoryError>> {
        Box::pin(self.insert_chunks_and_finalize(id, chunks))
    }

    fn fail_document(
        &self,
        id: DocumentId,
        reason: &str,
    ) -> BoxFuture<'_, Result<bool, MemoryError>> {
        let reason = reason.to_owned();
        Box::pin(async move { self.mark_failed(id, &reason).await })
    }

    fn delete_document(&self, id: DocumentId) -> BoxFuture<'_, Result<bool, MemoryError>> {
        Box::pin(self.remove_document(id))
    }

    fn chunks_for_document(
        &self,
        id: DocumentId,
    ) -> BoxFuture<'_, Result<Vec<ChunkRecord>, MemoryError>> {
        Box::pin(self.load_chunks(id))
    }

    fn search_nearest(
        &self,
        query: Vec<f32>,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<SearchHit>, MemoryError>> {
        Box::pin(async move { self.nearest_chunks(&query, limit).await })
    }

    fn fail_stale_documents(
        &self,
        older_than: Duration,
    ) -> BoxFuture<'_, Result<Vec<DocumentId>, MemoryError>> {
        Box::pin(self.mark_stale_failed(older_than))
    }
}
