//! Test-only mock provider.
//!
//! Embeddings are a hashed bag of words: every lowercase word is hashed into one of
//! `dimension` buckets, so texts sharing words land close to each other under cosine
//! distance. That keeps retrieval tests meaningful without a real model.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::LlmError;
use crate::provider::{ChatStream, EmbedMode, LlmProvider};

#[derive(Debug, Clone)]
pub struct MockProvider {
    pub default_response: String,
    /// Embedding calls for texts containing this marker fail.
    pub fail_embed_containing: Option<String>,
    /// Return vectors of this length regardless of the requested dimension.
    pub dimension_override: Option<usize>,
    pub fail_generate: bool,
    /// Milliseconds to sleep before answering an embedding call.
    pub delay_ms: u64,
    embed_calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            default_response: "mock response".into(),
            fail_embed_containing: None,
            dimension_override: None,
            fail_generate: false,
            delay_ms: 0,
            embed_calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_response(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_embed_containing = Some(marker.into());
        self
    }

    #[must_use]
    pub fn with_dimension_override(mut self, dimension: usize) -> Self {
        self.dimension_override = Some(dimension);
        self
    }

    #[must_use]
    pub fn failing_generate(mut self) -> Self {
        self.fail_generate = true;
        self
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Number of `embed` calls seen so far, across clones.
    #[must_use]
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::Relaxed)
    }

    /// Most `embed` calls ever running at the same time, across clones.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

/// Deterministic hashed bag-of-words vector.
#[must_use]
pub fn bag_of_words(text: &str, dimension: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dimension];
    if dimension == 0 {
        return v;
    }
    for word in text.split_whitespace() {
        let word = word
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if word.is_empty() {
            continue;
        }
        let hash = blake3::hash(word.as_bytes());
        let mut bucket = [0u8; 8];
        bucket.copy_from_slice(&hash.as_bytes()[..8]);
        #[allow(clippy::cast_possible_truncation)]
        let idx = (u64::from_le_bytes(bucket) % dimension as u64) as usize;
        v[idx] += 1.0;
    }
    v
}

impl LlmProvider for MockProvider {
    async fn embed(
        &self,
        text: &str,
        _mode: EmbedMode,
        dimension: usize,
    ) -> Result<Vec<f32>, LlmError> {
        self.embed_calls.fetch_add(1, Ordering::Relaxed);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(marker) = &self.fail_embed_containing
            && text.contains(marker.as_str())
        {
            return Err(LlmError::Other("mock embed error".into()));
        }
        Ok(bag_of_words(
            text,
            self.dimension_override.unwrap_or(dimension),
        ))
    }

    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        if self.fail_generate {
            return Err(LlmError::Other("mock generate error".into()));
        }
        Ok(self.default_response.clone())
    }

    async fn generate_stream(&self, prompt: &str) -> Result<ChatStream, LlmError> {
        let response = self.generate(prompt).await?;
        let pieces: Vec<_> = response
            .split_inclusive(' ')
            .map(str::to_owned)
            .map(Ok)
            .collect();
        Ok(Box::pin(tokio_stream::iter(pieces)))
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}
