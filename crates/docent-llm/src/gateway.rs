use std::sync::Arc;

use crate::any::AnyProvider;
use crate::error::LlmError;
use crate::provider::{EmbedMode, LlmProvider};

/// Single entry point for embeddings.
///
/// Document-mode and query-mode calls are issued from different places (ingestion
/// and retrieval) but both go through here, so the model and dimension `D` are
/// guaranteed to match. A vector of the wrong length or with non-finite entries is
/// an error, never passed on.
#[derive(Debug, Clone)]
pub struct EmbeddingGateway {
    provider: Arc<AnyProvider>,
    dimension: usize,
}

impl EmbeddingGateway {
    #[must_use]
    pub fn new(provider: Arc<AnyProvider>, dimension: usize) -> Self {
        Self {
            provider,
            dimension,
        }
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<AnyProvider> {
        &self.provider
    }

    /// # Errors
    ///
    /// Returns the provider error, or `LlmError::DimensionMismatch` / `LlmError::Other`
    /// when the returned vector is malformed.
    pub async fn embed(&self, text: &str, mode: EmbedMode) -> Result<Vec<f32>, LlmError> {
        let vector = self.provider.embed(text, mode, self.dimension).await?;
        if vector.len() != self.dimension {
            return Err(LlmError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(LlmError::Other(format!(
                "{} returned a non-finite embedding",
                self.provider.name()
            )));
        }
        tracing::trace!(mode = mode.as_str(), dims = vector.len(), "embedded text");
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProvider;

    fn gateway(mock: MockProvider, dimension: usize) -> EmbeddingGateway {
        EmbeddingGateway::new(Arc::new(AnyProvider::Mock(mock)), dimension)
    }

    #[tokio::test]
    async fn document_and_query_share_dimension() {
        let gw = gateway(MockProvider::default(), 16);
        let d = gw.embed("some text", EmbedMode::Document).await.unwrap();
        let q = gw.embed("some text", EmbedMode::Query).await.unwrap();
        assert_eq!(d.len(), 16);
        assert_eq!(q.len(), 16);
        assert_eq!(d, q);
    }

    #[tokio::test]
    async fn wrong_dimension_rejected() {
        let gw = gateway(MockProvider::default().with_dimension_override(4), 16);
        let err = gw.embed("x", EmbedMode::Document).await.unwrap_err();
        assert!(matches!(
            err,
            LlmError::DimensionMismatch {
                expected: 16,
                actual: 4
            }
        ));
    }

    #[tokio::test]
    async fn provider_error_propagates() {
        let gw = gateway(MockProvider::default().failing_on("bad"), 8);
        assert!(gw.embed("bad input", EmbedMode::Document).await.is_err());
    }

    proptest::proptest! {
        #[test]
        fn only_exact_dimension_passes(expected in 1usize..64, actual in 1usize..64) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let gw = gateway(MockProvider::default().with_dimension_override(actual), expected);
            let result = rt.block_on(gw.embed("any text here", EmbedMode::Query));
            proptest::prop_assert_eq!(result.is_ok(), actual == expected);
        }
    }
}
