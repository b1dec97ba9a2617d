use std::fmt;
use std::sync::Arc;

use docent_llm::{EmbedMode, EmbeddingGateway};
use futures::{StreamExt, TryStreamExt};

use super::{
    DEFAULT_MAX_UPLOAD_BYTES, DocumentError, MediaType, TextSplitter, Upload, extract_text,
};
use crate::store::DocumentStore;
use crate::types::{DocumentId, DocumentStatus, NewChunk};

/// Default number of concurrent embedding calls per document.
pub const DEFAULT_EMBED_CONCURRENCY: usize = 4;

/// Non-terminal steps of one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Extracting,
    Chunking,
    Embedding,
    Persisting,
}

impl IngestStage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Extracting => "extracting",
            Self::Chunking => "chunking",
            Self::Embedding => "embedding",
            Self::Persisting => "persisting",
        }
    }
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one ingestion run once the document has reached a terminal status.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub document_id: DocumentId,
    pub filename: String,
    pub status: DocumentStatus,
    pub chunk_count: usize,
    pub error: Option<String>,
}

/// Drives a document through extract → chunk → embed → persist.
///
/// Every run creates a fresh document, so re-running the same upload is safe.
/// Chunks are committed in one transaction together with the `ready` transition;
/// any failure after the document exists marks it `failed` and leaves no chunks.
pub struct IngestionPipeline {
    store: Arc<dyn DocumentStore>,
    gateway: EmbeddingGateway,
    splitter: TextSplitter,
    embed_concurrency: usize,
    max_upload_bytes: u64,
}

impl fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("splitter", &self.splitter)
            .field("embed_concurrency", &self.embed_concurrency)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish_non_exhaustive()
    }
}

impl IngestionPipeline {
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        gateway: EmbeddingGateway,
        splitter: TextSplitter,
    ) -> Self {
        Self {
            store,
            gateway,
            splitter,
            embed_concurrency: DEFAULT_EMBED_CONCURRENCY,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Values below 1 are raised to 1.
    #[must_use]
    pub fn with_embed_concurrency(mut self, limit: usize) -> Self {
        self.embed_concurrency = limit.max(1);
        self
    }

    #[must_use]
    pub fn with_max_upload_bytes(mut self, limit: u64) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    #[must_use]
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Checks an upload without touching storage.
    ///
    /// # Errors
    ///
    /// See [`Upload::validate`].
    pub fn validate(&self, upload: &Upload) -> Result<MediaType, DocumentError> {
        upload.validate(self.max_upload_bytes)
    }

    /// Ingest one upload to a terminal status.
    ///
    /// # Errors
    ///
    /// Rejections (`UnsupportedMediaType`, `EmptyInput`, `FileTooLarge`) are
    /// returned before any document is created. Once the document exists, failures
    /// are recorded on it and reported through [`IngestReport`]; only a storage
    /// error while creating the document or recording its failure is returned.
    pub async fn ingest(&self, upload: Upload) -> Result<IngestReport, DocumentError> {
        let media = self.validate(&upload)?;
        let Upload {
            filename, bytes, ..
        } = upload;

        let id = self
            .store
            .create_document(&filename, media.as_str())
            .await?;
        tracing::info!(document_id = %id, filename = %filename, content_type = %media, "document created");

        match self.process(id, media, bytes).await {
            Ok(Some(chunk_count)) => {
                tracing::info!(document_id = %id, chunks = chunk_count, "document ready");
                Ok(IngestReport {
                    document_id: id,
                    filename,
                    status: DocumentStatus::Ready,
                    chunk_count,
                    error: None,
                })
            }
            Ok(None) => self.superseded(id, filename).await,
            Err(e) => self.fail(id, filename, &e).await,
        }
    }

    /// Returns `Ok(None)` when the document left `processing` before the commit.
    async fn process(
        &self,
        id: DocumentId,
        media: MediaType,
        bytes: Vec<u8>,
    ) -> Result<Option<usize>, DocumentError> {
        log_stage(id, IngestStage::Extracting);
        let text = extract_text(media, bytes).await?;

        log_stage(id, IngestStage::Chunking);
        let pieces = self.splitter.split(&text);

        log_stage(id, IngestStage::Embedding);
        let calls: Vec<_> = pieces
            .iter()
            .cloned()
            .map(|piece| {
                let gateway = self.gateway.clone();
                async move { gateway.embed(&piece, EmbedMode::Document).await }
            })
            .collect();
        let embeddings: Vec<Vec<f32>> = futures::stream::iter(calls)
            .buffered(self.embed_concurrency)
            .try_collect()
            .await?;

        log_stage(id, IngestStage::Persisting);
        let chunks: Vec<NewChunk> = pieces
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(chunk_index, (content, embedding))| NewChunk {
                chunk_index,
                content,
                embedding,
            })
            .collect();
        let count = chunks.len();

        if self.store.commit_chunks(id, chunks).await? {
            Ok(Some(count))
        } else {
            Ok(None)
        }
    }

    async fn fail(
        &self,
        id: DocumentId,
        filename: String,
        cause: &DocumentError,
    ) -> Result<IngestReport, DocumentError> {
        let reason = cause.to_string();
        if self.store.fail_document(id, &reason).await? {
            tracing::warn!(document_id = %id, error = %reason, "document failed");
        } else {
            tracing::debug!(document_id = %id, "document already terminal, failure not recorded");
        }
        Ok(IngestReport {
            document_id: id,
            filename,
            status: DocumentStatus::Failed,
            chunk_count: 0,
            error: Some(reason),
        })
    }

    async fn superseded(
        &self,
        id: DocumentId,
        filename: String,
    ) -> Result<IngestReport, DocumentError> {
        let current = self
            .store
            .get_document(id)
            .await?
            .ok_or(DocumentError::NotFound(id))?;
        tracing::warn!(document_id = %id, status = %current.status, "document left processing before commit");
        Ok(IngestReport {
            document_id: id,
            filename,
            status: current.status,
            chunk_count: current.chunk_count,
            error: current.error,
        })
    }
}

fn log_stage(id: DocumentId, stage: IngestStage) {
    tracing::debug!(document_id = %id, stage = %stage, "ingestion stage");
}

#[cfg(test)]
mod tests {
    use docent_llm::AnyProvider;
    use docent_llm::mock::MockProvider;

    use super::*;
    use crate::document::SplitterConfig;
    use crate::in_memory_store::InMemoryStore;

    const DIM: usize = 16;

    fn pipeline_with(mock: MockProvider, size: usize, overlap: usize) -> IngestionPipeline {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryStore::new());
        let gateway = EmbeddingGateway::new(Arc::new(AnyProvider::Mock(mock)), DIM);
        let splitter = TextSplitter::new(SplitterConfig::new(size, overlap).unwrap());
        IngestionPipeline::new(store, gateway, splitter)
    }

    fn text_upload(body: &str) -> Upload {
        Upload::new("doc.txt", "text/plain", body.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn ingest_text_reaches_ready() {
        let pipeline = pipeline_with(MockProvider::default(), 4, 1);
        let report = pipeline
            .ingest(text_upload("the quick brown fox jumps over the lazy dog"))
            .await
            .unwrap();

        assert_eq!(report.status, DocumentStatus::Ready);
        assert_eq!(report.chunk_count, 3);
        assert!(report.error.is_none());

        let chunks = pipeline
            .store()
            .chunks_for_document(report.document_id)
            .await
            .unwrap();
        let indices: Vec<_> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(chunks[1].content, "fox jumps over the");
        assert!(chunks.iter().all(|c| c.embedding.len() == DIM));
    }

    #[tokio::test]
    async fn empty_upload_creates_no_document() {
        let pipeline = pipeline_with(MockProvider::default(), 4, 1);
        let err = pipeline.ingest(text_upload("")).await.unwrap_err();
        assert!(matches!(err, DocumentError::EmptyInput));
        assert!(pipeline.store().list_documents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsupported_type_creates_no_document() {
        let pipeline = pipeline_with(MockProvider::default(), 4, 1);
        let upload = Upload::new("a.png", "image/png", vec![1, 2, 3]);
        let err = pipeline.ingest(upload).await.unwrap_err();
        assert!(matches!(err, DocumentError::UnsupportedMediaType(_)));
        assert!(pipeline.store().list_documents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_upload_rejected() {
        let pipeline =
            pipeline_with(MockProvider::default(), 4, 1).with_max_upload_bytes(3);
        let err = pipeline.ingest(text_upload("four")).await.unwrap_err();
        assert!(matches!(err, DocumentError::FileTooLarge { .. }));
    }

    #[tokio::test]
    async fn embedding_failure_fails_document_without_chunks() {
        let pipeline = pipeline_with(MockProvider::default().failing_on("POISON"), 2, 0);
        let report = pipeline
            .ingest(text_upload("good words then POISON here and more"))
            .await
            .unwrap();

        assert_eq!(report.status, DocumentStatus::Failed);
        assert!(report.error.as_deref().unwrap().contains("embedding unavailable"));

        let doc = pipeline
            .store()
            .get_document(report.document_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert_eq!(doc.chunk_count, 0);
        assert!(
            pipeline
                .store()
                .chunks_for_document(report.document_id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn wrong_dimension_fails_document() {
        let pipeline =
            pipeline_with(MockProvider::default().with_dimension_override(3), 4, 1);
        let report = pipeline.ingest(text_upload("some words")).await.unwrap();
        assert_eq!(report.status, DocumentStatus::Failed);
    }

    #[tokio::test]
    async fn whitespace_only_text_is_ready_with_no_chunks() {
        let pipeline = pipeline_with(MockProvider::default(), 4, 1);
        let report = pipeline.ingest(text_upload("   \n\t ")).await.unwrap();
        assert_eq!(report.status, DocumentStatus::Ready);
        assert_eq!(report.chunk_count, 0);
    }

    #[tokio::test]
    async fn concurrent_embedding_preserves_order() {
        let mock = MockProvider::default().with_delay(5);
        let pipeline = pipeline_with(mock.clone(), 3, 0).with_embed_concurrency(8);
        let body = (0..30).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let report = pipeline.ingest(text_upload(&body)).await.unwrap();
        assert_eq!(report.chunk_count, 10);
        assert_eq!(mock.embed_calls(), 10);
        assert!(mock.peak_in_flight() > 1);

        let chunks = pipeline
            .store()
            .chunks_for_document(report.document_id)
            .await
            .unwrap();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert!(chunk.content.starts_with(&format!("w{}", i * 3)));
        }
    }

    #[tokio::test]
    async fn embedding_calls_respect_concurrency_limit() {
        for limit in [1, 3] {
            let mock = MockProvider::default().with_delay(10);
            let pipeline = pipeline_with(mock.clone(), 2, 0).with_embed_concurrency(limit);
            let body = (0..24).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
            let report = pipeline.ingest(text_upload(&body)).await.unwrap();
            assert_eq!(report.chunk_count, 12);

            let peak = mock.peak_in_flight();
            assert!(peak <= limit, "peak {peak} above limit {limit}");
            if limit > 1 {
                assert!(peak > 1, "embedding calls never overlapped");
            }
        }
    }

    fn boxed_ingest(
        pipeline: &IngestionPipeline,
        upload: Upload,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<IngestReport, DocumentError>> + Send + '_>>
    {
        Box::pin(pipeline.ingest(upload))
    }

    #[tokio::test]
    async fn ingest_future_is_send() {
        let pipeline = pipeline_with(MockProvider::default(), 4, 1);
        let report = tokio::spawn(async move {
            boxed_ingest(&pipeline, text_upload("sent across threads")).await
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(report.status, DocumentStatus::Ready);
    }

    #[tokio::test]
    async fn resubmission_creates_new_document() {
        let pipeline = pipeline_with(MockProvider::default(), 4, 1);
        let a = pipeline.ingest(text_upload("same body")).await.unwrap();
        let b = pipeline.ingest(text_upload("same body")).await.unwrap();
        assert_ne!(a.document_id, b.document_id);
        assert_eq!(pipeline.store().list_documents().await.unwrap().len(), 2);
    }

    #[cfg(feature = "pdf")]
    #[tokio::test]
    async fn unparseable_pdf_fails_document() {
        let pipeline = pipeline_with(MockProvider::default(), 4, 1);
        let upload = Upload::new("broken.pdf", "application/pdf", b"not a pdf".to_vec());
        let report = pipeline.ingest(upload).await.unwrap();
        assert_eq!(report.status, DocumentStatus::Failed);
        assert!(report.error.unwrap().contains("extraction"));
    }
}
