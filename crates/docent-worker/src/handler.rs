use std::future::Future;
use std::pin::Pin;

use docent_memory::{DocumentError, DocumentId, DocumentStatus, IngestionPipeline, Upload};

use crate::error::WorkerError;

/// Result of a job run that reached a terminal document status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub document_id: DocumentId,
    pub document_status: DocumentStatus,
    pub error: Option<String>,
}

pub trait JobHandler: Send + Sync {
    /// Synchronous admission check run by `submit` before the job is stored.
    ///
    /// # Errors
    ///
    /// Returns the rejection reason.
    fn validate(&self, upload: &Upload) -> Result<(), DocumentError>;

    fn run(
        &self,
        upload: Upload,
    ) -> Pin<Box<dyn Future<Output = Result<JobOutcome, WorkerError>> + Send + '_>>;
}

impl JobHandler for IngestionPipeline {
    fn validate(&self, upload: &Upload) -> Result<(), DocumentError> {
        IngestionPipeline::validate(self, upload).map(|_| ())
    }

    fn run(
        &self,
        upload: Upload,
    ) -> Pin<Box<dyn Future<Output = Result<JobOutcome, WorkerError>> + Send + '_>> {
        Box::pin(async move {
            match self.ingest(upload).await {
                Ok(report) => Ok(JobOutcome {
                    document_id: report.document_id,
                    document_status: report.status,
                    error: report.error,
                }),
                Err(e) if e.is_rejection() => Err(WorkerError::Rejected(e)),
                Err(e) => Err(WorkerError::Handler(e.to_string())),
            }
        })
    }
}
