use std::fmt;

use serde::{Deserialize, Serialize};

/// String that never shows up in `Debug` or `Display` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub memory: MemoryConfig,
    pub ingestion: IngestionConfig,
    pub retrieval: RetrievalConfig,
    pub worker: WorkerConfig,
    pub reconcile: ReconcileConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

/// LLM provider backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Gemini,
    /// Deterministic offline provider; only usable when built with `mock`.
    Mock,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Mock => "mock",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub base_url: String,
    pub embedding_model: String,
    pub generation_model: String,
    /// Retries for generation requests rejected with HTTP 429.
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            base_url: docent_llm::gemini::DEFAULT_BASE_URL.into(),
            embedding_model: "gemini-embedding-001".into(),
            generation_model: "gemini-2.5-flash".into(),
            max_retries: 3,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub sqlite_path: String,
    /// Dimension `D` of every stored and query embedding.
    pub embedding_dim: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "data/docent.db".into(),
            embedding_dim: 768,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Words per chunk.
    pub chunk_size: usize,
    /// Words shared by consecutive chunks.
    pub chunk_overlap: usize,
    pub embed_concurrency: usize,
    pub max_upload_bytes: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            chunk_size: docent_memory::SplitterConfig::DEFAULT_CHUNK_SIZE,
            chunk_overlap: docent_memory::SplitterConfig::DEFAULT_CHUNK_OVERLAP,
            embed_concurrency: docent_memory::document::pipeline::DEFAULT_EMBED_CONCURRENCY,
            max_upload_bytes: docent_memory::document::DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: docent_memory::retrieval::DEFAULT_TOP_K,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    /// Jobs `running` for longer than this at worker start-up are assumed
    /// orphaned by a dead process and re-queued.
    pub running_lease_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 64,
            max_attempts: 3,
            retry_delay_ms: 1000,
            running_lease_secs: 3600,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Documents still `processing` after this many seconds are failed.
    pub stale_after_secs: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: 3600,
        }
    }
}

/// Secrets resolved from the environment after the file is loaded.
#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub gemini_api_key: Option<Secret>,
}
