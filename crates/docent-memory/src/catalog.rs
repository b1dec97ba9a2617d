use std::sync::Arc;
use std::time::Duration;

use crate::document::DocumentError;
use crate::store::DocumentStore;
use crate::types::{ChunkRecord, DocumentId, DocumentRecord};

/// Read and delete operations on documents, with missing identities reported as
/// [`DocumentError::NotFound`].
#[derive(Clone)]
pub struct DocumentCatalog {
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for DocumentCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCatalog").finish_non_exhaustive()
    }
}

impl DocumentCatalog {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// # Errors
    ///
    /// Returns a storage error if the listing fails.
    pub async fn list(&self) -> Result<Vec<DocumentRecord>, DocumentError> {
        Ok(self.store.list_documents().await?)
    }

    /// # Errors
    ///
    /// Returns [`DocumentError::NotFound`] for an unknown id.
    pub async fn get(&self, id: DocumentId) -> Result<DocumentRecord, DocumentError> {
        self.store
            .get_document(id)
            .await?
            .ok_or(DocumentError::NotFound(id))
    }

    /// Remove a document and all of its chunks.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NotFound`] if the document does not exist or was
    /// already removed.
    pub async fn delete(&self, id: DocumentId) -> Result<(), DocumentError> {
        if self.store.delete_document(id).await? {
            tracing::info!(document_id = %id, "document deleted");
            Ok(())
        } else {
            Err(DocumentError::NotFound(id))
        }
    }

    /// # Errors
    ///
    /// Returns [`DocumentError::NotFound`] for an unknown id.
    pub async fn chunks(&self, id: DocumentId) -> Result<Vec<ChunkRecord>, DocumentError> {
        self.get(id).await?;
        Ok(self.store.chunks_for_document(id).await?)
    }

    /// Fail documents stuck in `processing` for longer than `older_than`.
    /// Repeated runs are harmless.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the update fails.
    pub async fn fail_stale(&self, older_than: Duration) -> Result<Vec<DocumentId>, DocumentError> {
        let failed = self.store.fail_stale_documents(older_than).await?;
        for id in &failed {
            tracing::warn!(document_id = %id, "stale document marked failed");
        }
        Ok(failed)
    }
}
