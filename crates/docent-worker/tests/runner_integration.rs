use std::sync::Arc;
use std::time::Duration;

use docent_llm::mock::MockProvider;
use docent_llm::{AnyProvider, EmbeddingGateway};
use docent_memory::{
    DocumentCatalog, DocumentStatus, DocumentStore, IngestionPipeline, SplitterConfig,
    SqliteStore, TextSplitter, Upload,
};
use docent_worker::{JobStatus, JobStore, RunnerConfig, TaskRunner, WorkerError};
use tokio::sync::watch;

struct Env {
    _dir: tempfile::TempDir,
    catalog: DocumentCatalog,
    runner: TaskRunner,
    shutdown: watch::Sender<bool>,
}

async fn env(mock: MockProvider) -> Env {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("docent.db");
    let sqlite = SqliteStore::new(path.to_str().unwrap()).await.unwrap();
    let jobs = JobStore::new(sqlite.pool().clone());
    let store: Arc<dyn DocumentStore> = Arc::new(sqlite);

    let gateway = EmbeddingGateway::new(Arc::new(AnyProvider::Mock(mock)), 16);
    let pipeline = IngestionPipeline::new(
        Arc::clone(&store),
        gateway,
        TextSplitter::new(SplitterConfig::new(6, 2).unwrap()),
    );

    let (shutdown, rx) = watch::channel(false);
    let runner = TaskRunner::start(
        jobs,
        Arc::new(pipeline),
        RunnerConfig {
            retry_delay: Duration::from_millis(5),
            ..RunnerConfig::default()
        },
        rx,
    )
    .await
    .unwrap();

    Env {
        _dir: dir,
        catalog: DocumentCatalog::new(store),
        runner,
        shutdown,
    }
}

#[tokio::test]
async fn submitted_upload_becomes_ready_document() {
    let env = env(MockProvider::default()).await;

    let mut handle = env
        .runner
        .submit(Upload::new(
            "notes.txt",
            "text/plain",
            b"one two three four five six seven eight nine ten".to_vec(),
        ))
        .await
        .unwrap();
    let status = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status, JobStatus::Completed);

    let job = env.runner.status(handle.id()).await.unwrap();
    let document_id = job.document_id.unwrap();
    let doc = env.catalog.get(document_id).await.unwrap();
    assert_eq!(doc.status, DocumentStatus::Ready);
    assert_eq!(doc.filename, "notes.txt");
    assert_eq!(doc.chunk_count, 2);

    env.shutdown.send(true).unwrap();
    env.runner.join().await;
}

#[tokio::test]
async fn embedding_failure_completes_job_with_failed_document() {
    let env = env(MockProvider::default().failing_on("poison")).await;

    let mut handle = env
        .runner
        .submit(Upload::new("bad.txt", "text/plain", b"poison pill".to_vec()))
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .unwrap()
        .unwrap();

    let job = env.runner.status(handle.id()).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts, 1);
    assert!(job.error.is_some());

    let doc = env.catalog.get(job.document_id.unwrap()).await.unwrap();
    assert_eq!(doc.status, DocumentStatus::Failed);
    assert_eq!(doc.chunk_count, 0);
}

#[tokio::test]
async fn unsupported_upload_is_rejected_before_queueing() {
    let env = env(MockProvider::default()).await;
    let err = env
        .runner
        .submit(Upload::new("pic.png", "image/png", vec![1, 2, 3]))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::Rejected(_)));
    assert!(env.catalog.list().await.unwrap().is_empty());
}
