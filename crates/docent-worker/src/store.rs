use std::time::Duration;

use chrono::{DateTime, Utc};
use docent_memory::{DocumentId, Upload};
use sqlx::SqlitePool;

use crate::error::WorkerError;
use crate::handler::JobOutcome;
use crate::job::{JobRecord, TaskId};

type JobRow = (
    TaskId,
    String,
    String,
    String,
    i64,
    Option<DocumentId>,
    Option<String>,
    i64,
    i64,
);

/// A job taken by a worker, with the attempt number of this run.
#[derive(Debug)]
pub struct ClaimedJob {
    pub upload: Upload,
    pub attempt: u32,
}

#[derive(Debug, Clone)]
pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the `ingest_jobs` table.
    ///
    /// # Errors
    ///
    /// Returns an error if the SQL statement fails.
    pub async fn init(&self) -> Result<(), WorkerError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS ingest_jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL,
                content_type TEXT NOT NULL,
                payload BLOB,
                status TEXT NOT NULL DEFAULT 'queued'
                    CHECK (status IN ('queued', 'running', 'completed', 'failed')),
                attempts INTEGER NOT NULL DEFAULT 0,
                document_id INTEGER,
                error TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_ingest_jobs_status ON ingest_jobs(status)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Persist a new job in `queued` status.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn enqueue(&self, upload: &Upload) -> Result<TaskId, WorkerError> {
        let now = now_millis();
        let (id,): (TaskId,) = sqlx::query_as(
            "INSERT INTO ingest_jobs (filename, content_type, payload, status, created_at, updated_at)
             VALUES (?, ?, ?, 'queued', ?, ?) RETURNING id",
        )
        .bind(&upload.filename)
        .bind(&upload.content_type)
        .bind(&upload.bytes)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Move a `queued` job to `running` and bump its attempt counter.
    ///
    /// Returns `None` if the job is not `queued`, e.g. a duplicate queue entry
    /// for a job another worker already took.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn claim(&self, id: TaskId) -> Result<Option<ClaimedJob>, WorkerError> {
        let row: Option<(String, String, Option<Vec<u8>>, i64)> = sqlx::query_as(
            "UPDATE ingest_jobs SET status = 'running', attempts = attempts + 1, updated_at = ?
             WHERE id = ? AND status = 'queued'
             RETURNING filename, content_type, payload, attempts",
        )
        .bind(now_millis())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((filename, content_type, payload, attempts)) = row else {
            return Ok(None);
        };
        let Some(bytes) = payload else {
            self.finish_failed(id, "job payload missing").await?;
            return Ok(None);
        };
        Ok(Some(ClaimedJob {
            upload: Upload {
                filename,
                content_type,
                bytes,
            },
            attempt: u32::try_from(attempts).unwrap_or(u32::MAX),
        }))
    }

    /// Mark a job completed and drop its payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn finish_completed(
        &self,
        id: TaskId,
        outcome: &JobOutcome,
    ) -> Result<(), WorkerError> {
        sqlx::query(
            "UPDATE ingest_jobs SET status = 'completed', document_id = ?, error = ?,
                payload = NULL, updated_at = ?
             WHERE id = ?",
        )
        .bind(outcome.document_id)
        .bind(outcome.error.as_deref())
        .bind(now_millis())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark a job failed and drop its payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn finish_failed(&self, id: TaskId, error: &str) -> Result<(), WorkerError> {
        sqlx::query(
            "UPDATE ingest_jobs SET status = 'failed', error = ?, payload = NULL, updated_at = ?
             WHERE id = ?",
        )
        .bind(error)
        .bind(now_millis())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Put a running job back in the queue, keeping its payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn requeue(&self, id: TaskId, error: &str) -> Result<(), WorkerError> {
        sqlx::query(
            "UPDATE ingest_jobs SET status = 'queued', error = ?, updated_at = ?
             WHERE id = ? AND status = 'running'",
        )
        .bind(error)
        .bind(now_millis())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Re-queue `running` jobs untouched for longer than `lease` and return every
    /// queued job, oldest first.
    ///
    /// A job that another live process is executing was claimed recently, so it
    /// keeps its `running` status as long as `lease` exceeds the longest run.
    ///
    /// # Errors
    ///
    /// Returns an error if the update or query fails.
    pub async fn recover(&self, lease: Duration) -> Result<Vec<TaskId>, WorkerError> {
        let now = now_millis();
        let cutoff = now.saturating_sub(i64::try_from(lease.as_millis()).unwrap_or(i64::MAX));
        let reset = sqlx::query(
            "UPDATE ingest_jobs SET status = 'queued', updated_at = ?
             WHERE status = 'running' AND updated_at <= ?",
        )
        .bind(now)
        .bind(cutoff)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if reset > 0 {
            tracing::info!(jobs = reset, "re-queued interrupted jobs");
        }

        let rows: Vec<(TaskId,)> =
            sqlx::query_as("SELECT id FROM ingest_jobs WHERE status = 'queued' ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    /// # Errors
    ///
    /// Returns an error if the query fails or the row is malformed.
    pub async fn get(&self, id: TaskId) -> Result<Option<JobRecord>, WorkerError> {
        let row: Option<JobRow> = sqlx::query_as(
            "SELECT id, filename, content_type, status, attempts, document_id, error,
                    created_at, updated_at
             FROM ingest_jobs WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_record).transpose()
    }
}

fn row_to_record(row: JobRow) -> Result<JobRecord, WorkerError> {
    let (id, filename, content_type, status, attempts, document_id, error, created, updated) = row;
    Ok(JobRecord {
        id,
        filename,
        content_type,
        status: status.parse()?,
        attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
        document_id,
        error,
        created_at: millis_to_datetime(created)?,
        updated_at: millis_to_datetime(updated)?,
    })
}

fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>, WorkerError> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| WorkerError::InvalidStatus(format!("invalid timestamp {ms}")))
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
