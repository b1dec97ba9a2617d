use std::sync::Arc;

use docent_llm::{EmbedMode, EmbeddingGateway};

use crate::document::DocumentError;
use crate::store::DocumentStore;
use crate::types::SearchHit;

/// Default number of chunks returned per question.
pub const DEFAULT_TOP_K: usize = 5;

/// Question → nearest chunks of `ready` documents.
pub struct Retriever {
    store: Arc<dyn DocumentStore>,
    gateway: EmbeddingGateway,
    default_top_k: usize,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("default_top_k", &self.default_top_k)
            .finish_non_exhaustive()
    }
}

impl Retriever {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, gateway: EmbeddingGateway) -> Self {
        Self {
            store,
            gateway,
            default_top_k: DEFAULT_TOP_K,
        }
    }

    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidArgument`] when `top_k` is zero.
    pub fn with_default_top_k(mut self, top_k: usize) -> Result<Self, DocumentError> {
        if top_k == 0 {
            return Err(DocumentError::InvalidArgument(
                "default top_k must be positive".into(),
            ));
        }
        self.default_top_k = top_k;
        Ok(self)
    }

    #[must_use]
    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Up to `top_k` chunks ordered by ascending cosine distance to `question`.
    ///
    /// `None` uses the configured default. An empty store yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidArgument`] for `Some(0)` or a blank question,
    /// [`DocumentError::EmbeddingUnavailable`] if the question cannot be embedded,
    /// or a storage error.
    pub async fn search(
        &self,
        question: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<SearchHit>, DocumentError> {
        let top_k = top_k.unwrap_or(self.default_top_k);
        if top_k == 0 {
            return Err(DocumentError::InvalidArgument(
                "top_k must be a positive integer".into(),
            ));
        }
        if question.trim().is_empty() {
            return Err(DocumentError::InvalidArgument(
                "question must not be empty".into(),
            ));
        }

        let query = self.gateway.embed(question, EmbedMode::Query).await?;
        let hits = self.store.search_nearest(query, top_k).await?;
        tracing::debug!(top_k, hits = hits.len(), "retrieved chunks");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use docent_llm::AnyProvider;
    use docent_llm::mock::{MockProvider, bag_of_words};

    use super::*;
    use crate::in_memory_store::InMemoryStore;
    use crate::types::NewChunk;

    const DIM: usize = 32;

    fn retriever(mock: MockProvider) -> (Arc<dyn DocumentStore>, Retriever) {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryStore::new());
        let gateway = EmbeddingGateway::new(Arc::new(AnyProvider::Mock(mock)), DIM);
        (Arc::clone(&store), Retriever::new(store, gateway))
    }

    async fn seed(store: &Arc<dyn DocumentStore>, texts: &[&str]) {
        let id = store.create_document("seed.txt", "text/plain").await.unwrap();
        let chunks = texts
            .iter()
            .enumerate()
            .map(|(i, t)| NewChunk {
                chunk_index: i,
                content: (*t).to_owned(),
                embedding: bag_of_words(t, DIM),
            })
            .collect();
        store.commit_chunks(id, chunks).await.unwrap();
    }

    #[tokio::test]
    async fn empty_store_returns_nothing() {
        let (_, retriever) = retriever(MockProvider::default());
        assert!(retriever.search("anything", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_top_k_rejected() {
        let (_, retriever) = retriever(MockProvider::default());
        assert!(matches!(
            retriever.search("q", Some(0)).await,
            Err(DocumentError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn blank_question_rejected() {
        let (_, retriever) = retriever(MockProvider::default());
        assert!(matches!(
            retriever.search("   ", None).await,
            Err(DocumentError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn most_similar_chunk_first() {
        let (store, retriever) = retriever(MockProvider::default());
        seed(
            &store,
            &[
                "rust ownership and borrowing rules",
                "baking sourdough bread at home",
                "garden tomatoes need sunlight",
            ],
        )
        .await;

        let hits = retriever.search("sourdough bread", Some(2)).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "baking sourdough bread at home");
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[tokio::test]
    async fn default_top_k_caps_results() {
        let (store, retriever) = retriever(MockProvider::default());
        let retriever = retriever.with_default_top_k(2).unwrap();
        seed(&store, &["a one", "b two", "c three", "d four"]).await;
        assert_eq!(retriever.search("one", None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn embedding_failure_surfaces() {
        let (_, retriever) = retriever(MockProvider::default().failing_on("boom"));
        assert!(matches!(
            retriever.search("boom", None).await,
            Err(DocumentError::EmbeddingUnavailable(_))
        ));
    }
}
