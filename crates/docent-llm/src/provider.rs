use std::future::Future;
use std::pin::Pin;

use futures_core::Stream;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Lazily produced answer fragments, terminated when the provider signals completion.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Which side of a retrieval pair a text is embedded for.
///
/// Both modes go to the same model with the same output dimensionality so that
/// distances between document and query vectors stay comparable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedMode {
    Document,
    Query,
}

impl EmbedMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Query => "query",
        }
    }
}

pub trait LlmProvider: Send + Sync {
    /// Embed `text` into a vector of the configured dimensionality.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, rate limiting or a malformed response.
    fn embed(
        &self,
        text: &str,
        mode: EmbedMode,
        dimension: usize,
    ) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    /// Produce a complete answer for `prompt`.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails or returns no text.
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Produce the answer for `prompt` as a stream of text fragments.
    ///
    /// # Errors
    ///
    /// Returns an error if the streaming request cannot be started.
    fn generate_stream(
        &self,
        prompt: &str,
    ) -> impl Future<Output = Result<ChatStream, LlmError>> + Send;

    fn name(&self) -> &str;
}
