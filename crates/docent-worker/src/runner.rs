use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use docent_memory::Upload;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::WorkerError;
use crate::handler::JobHandler;
use crate::job::{JobRecord, JobStatus, TaskId};
use crate::store::JobStore;

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    /// Runs allowed per job before a retryable failure becomes terminal.
    pub max_attempts: u32,
    /// Base delay before a failed job is queued again; grows linearly per attempt.
    pub retry_delay: Duration,
    /// Schedule jobs already in the table at start-up. A runner that only serves
    /// its own submissions leaves the backlog to a dedicated worker process.
    pub resume_pending: bool,
    /// A `running` job older than this is treated as abandoned by a dead process.
    pub running_lease: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 64,
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
            resume_pending: true,
            running_lease: Duration::from_secs(3600),
        }
    }
}

/// Observes one submitted job.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    status: watch::Receiver<JobStatus>,
}

impl TaskHandle {
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Last status published by the worker pool.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        *self.status.borrow()
    }

    /// Wait until the job is completed or failed.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::QueueClosed`] if the runner shut down first or could
    /// not record the job's outcome.
    pub async fn wait(&mut self) -> Result<JobStatus, WorkerError> {
        self.status
            .wait_for(|s| s.is_terminal())
            .await
            .map(|s| *s)
            .map_err(|_| WorkerError::QueueClosed)
    }
}

struct Shared {
    store: JobStore,
    handler: Arc<dyn JobHandler>,
    queue: mpsc::Sender<TaskId>,
    watchers: Mutex<HashMap<TaskId, watch::Sender<JobStatus>>>,
    config: RunnerConfig,
}

impl Shared {
    fn publish(&self, id: TaskId, status: JobStatus) {
        let Ok(mut watchers) = self.watchers.lock() else {
            return;
        };
        if status.is_terminal() {
            if let Some(tx) = watchers.remove(&id) {
                let _ = tx.send(status);
            }
        } else if let Some(tx) = watchers.get(&id) {
            let _ = tx.send(status);
        }
    }

    /// Queue `id` without blocking the caller when the channel is full.
    fn schedule(&self, id: TaskId, delay: Duration) {
        if delay.is_zero() {
            match self.queue.try_send(id) {
                Ok(()) => return,
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::warn!(task_id = %id, "queue closed, job left for recovery");
                    return;
                }
                Err(mpsc::error::TrySendError::Full(_)) => {}
            }
        }
        let queue = self.queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if queue.send(id).await.is_err() {
                tracing::warn!(task_id = %id, "queue closed, job left for recovery");
            }
        });
    }

    async fn process(&self, id: TaskId) {
        let claimed = match self.store.claim(id).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => {
                tracing::debug!(task_id = %id, "job not queued, skipping");
                return;
            }
            Err(e) => {
                tracing::warn!(task_id = %id, "failed to claim job: {e}");
                return;
            }
        };
        self.publish(id, JobStatus::Running);
        tracing::info!(task_id = %id, attempt = claimed.attempt, filename = %claimed.upload.filename, "running ingestion job");

        let status = match self.handler.run(claimed.upload).await {
            Ok(outcome) => {
                tracing::info!(
                    task_id = %id,
                    document_id = %outcome.document_id,
                    document_status = %outcome.document_status,
                    "ingestion job completed"
                );
                self.store
                    .finish_completed(id, &outcome)
                    .await
                    .map(|()| JobStatus::Completed)
            }
            Err(e) if e.is_retryable() && claimed.attempt < self.config.max_attempts => {
                let delay = self.config.retry_delay * claimed.attempt;
                tracing::warn!(task_id = %id, attempt = claimed.attempt, "ingestion job failed, retrying: {e}");
                let requeued = self.store.requeue(id, &e.to_string()).await;
                if requeued.is_ok() {
                    self.schedule(id, delay);
                }
                requeued.map(|()| JobStatus::Queued)
            }
            Err(e) => {
                tracing::warn!(task_id = %id, attempt = claimed.attempt, "ingestion job failed: {e}");
                self.store
                    .finish_failed(id, &e.to_string())
                    .await
                    .map(|()| JobStatus::Failed)
            }
        };

        match status {
            Ok(status) => self.publish(id, status),
            Err(e) => {
                tracing::error!(task_id = %id, "failed to record job status: {e}");
                self.abandon(id);
            }
        }
    }

    /// Drop the watcher so a waiting [`TaskHandle`] resolves with an error.
    fn abandon(&self, id: TaskId) {
        if let Ok(mut watchers) = self.watchers.lock() {
            watchers.remove(&id);
        }
    }
}

/// Pool of workers executing ingestion jobs from a durable queue.
///
/// `submit` returns as soon as the job is stored; completion is recorded on the
/// job row and published to its [`TaskHandle`].
pub struct TaskRunner {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("config", &self.shared.config)
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl TaskRunner {
    /// Initialize the job table, spawn the workers and, with
    /// [`RunnerConfig::resume_pending`], re-queue jobs left over by a previous
    /// process.
    ///
    /// Workers stop after their current job once `shutdown` turns `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the job table cannot be initialized or scanned.
    pub async fn start(
        store: JobStore,
        handler: Arc<dyn JobHandler>,
        config: RunnerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, WorkerError> {
        store.init().await?;

        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let worker_count = config.workers.max(1);
        let shared = Arc::new(Shared {
            store,
            handler,
            queue: tx,
            watchers: Mutex::new(HashMap::new()),
            config,
        });

        let workers = (0..worker_count)
            .map(|n| {
                tokio::spawn(worker_loop(
                    n,
                    Arc::clone(&shared),
                    Arc::clone(&rx),
                    shutdown.clone(),
                ))
            })
            .collect();

        if shared.config.resume_pending {
            let pending = shared.store.recover(shared.config.running_lease).await?;
            if !pending.is_empty() {
                tracing::info!(jobs = pending.len(), "resuming queued jobs");
            }
            for id in pending {
                shared.schedule(id, Duration::ZERO);
            }
        }

        Ok(Self { shared, workers })
    }

    /// Store the upload as a job and return immediately.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Rejected`] for uploads that fail validation (nothing
    /// is stored), or a database error.
    pub async fn submit(&self, upload: Upload) -> Result<TaskHandle, WorkerError> {
        self.shared
            .handler
            .validate(&upload)
            .map_err(WorkerError::Rejected)?;

        let id = self.shared.store.enqueue(&upload).await?;
        let (tx, rx) = watch::channel(JobStatus::Queued);
        if let Ok(mut watchers) = self.shared.watchers.lock() {
            watchers.insert(id, tx);
        }
        self.shared.schedule(id, Duration::ZERO);
        tracing::info!(task_id = %id, filename = %upload.filename, "ingestion job submitted");

        Ok(TaskHandle { id, status: rx })
    }

    /// Durable status of a job, including jobs submitted by other processes.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::NotFound`] for an unknown id.
    pub async fn status(&self, id: TaskId) -> Result<JobRecord, WorkerError> {
        self.shared
            .store
            .get(id)
            .await?
            .ok_or(WorkerError::NotFound(id))
    }

    #[must_use]
    pub fn store(&self) -> &JobStore {
        &self.shared.store
    }

    /// Wait for every worker to exit. Call after signalling shutdown.
    pub async fn join(self) {
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::error!("worker task panicked: {e}");
            }
        }
    }
}

async fn worker_loop(
    n: usize,
    shared: Arc<Shared>,
    queue: Arc<tokio::sync::Mutex<mpsc::Receiver<TaskId>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::debug!(worker = n, "worker started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        let next = {
            let mut rx = queue.lock().await;
            tokio::select! {
                id = rx.recv() => id,
                res = shutdown.changed() => {
                    if res.is_err() {
                        None
                    } else {
                        continue;
                    }
                }
            }
        };
        let Some(id) = next else {
            break;
        };
        shared.process(id).await;
    }
    tracing::debug!(worker = n, "worker stopped");
}
