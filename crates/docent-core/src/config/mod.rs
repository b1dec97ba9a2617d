mod env;
mod types;


pub use types::*;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject settings that would fail later in a less obvious place.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ingestion.chunk_size == 0 {
            bail!("ingestion.chunk_size must be positive");
        }
        if self.ingestion.chunk_overlap >= self.ingestion.chunk_size {
            bail!(
                "ingestion.chunk_overlap ({}) must be smaller than ingestion.chunk_size ({})",
                self.ingestion.chunk_overlap,
                self.ingestion.chunk_size
            );
        }
        if self.ingestion.embed_concurrency == 0 {
            bail!("ingestion.embed_concurrency must be positive");
        }
        if self.memory.embedding_dim == 0 {
            bail!("memory.embedding_dim must be positive");
        }
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be positive");
        }
        if self.worker.workers == 0 {
            bail!("worker.workers must be positive");
        }
        if self.worker.max_attempts == 0 {
            bail!("worker.max_attempts must be positive");
        }
        if self.llm.provider == ProviderKind::Mock && !cfg!(feature = "mock") {
            bail!("llm.provider = \"mock\" requires a build with the `mock` feature");
        }
        Ok(())
    }

    #[must_use]
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.reconcile.stale_after_secs)
    }
}

/// `--config` flag, then `DOCENT_CONFIG`, then `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("DOCENT_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}
