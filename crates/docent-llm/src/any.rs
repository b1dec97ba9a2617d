use crate::error::LlmError;
use crate::gemini::GeminiProvider;
#[cfg(any(test, feature = "mock"))]
use crate::mock::MockProvider;
use crate::provider::{ChatStream, EmbedMode, LlmProvider};

/// Generates a match over all `AnyProvider` variants, binding the inner provider
/// and evaluating the given expression for each arm.
macro_rules! delegate_provider {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyProvider::Gemini($p) => $expr,
            #[cfg(any(test, feature = "mock"))]
            AnyProvider::Mock($p) => $expr,
        }
    };
}

/// Process-wide provider, constructed once and shared by reference.
#[derive(Debug, Clone)]
pub enum AnyProvider {
    Gemini(GeminiProvider),
    #[cfg(any(test, feature = "mock"))]
    Mock(MockProvider),
}

impl LlmProvider for AnyProvider {
    async fn embed(
        &self,
        text: &str,
        mode: EmbedMode,
        dimension: usize,
    ) -> Result<Vec<f32>, LlmError> {
        delegate_provider!(self, |p| p.embed(text, mode, dimension).await)
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        delegate_provider!(self, |p| p.generate(prompt).await)
    }

    async fn generate_stream(&self, prompt: &str) -> Result<ChatStream, LlmError> {
        delegate_provider!(self, |p| p.generate_stream(prompt).await)
    }

    fn name(&self) -> &str {
        delegate_provider!(self, |p| p.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delegates_to_mock() {
        let p = AnyProvider::Mock(MockProvider::with_response("hi"));
        assert_eq!(p.name(), "mock");
        assert_eq!(p.generate("q").await.unwrap(), "hi");
        assert_eq!(p.embed("x", EmbedMode::Query, 5).await.unwrap().len(), 5);
    }

    #[test]
    fn gemini_variant_name() {
        let g = GeminiProvider::new(
            "k".into(),
            crate::gemini::DEFAULT_BASE_URL.into(),
            "e".into(),
            "g".into(),
        )
        .unwrap();
        assert_eq!(AnyProvider::Gemini(g).name(), "gemini");
    }
}
