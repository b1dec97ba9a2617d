//! Application bootstrap: provider, store and service construction from config.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use docent_llm::gemini::GeminiProvider;
use docent_llm::{AnyProvider, EmbeddingGateway, LlmProvider};
use docent_memory::{
    DocumentCatalog, DocumentStore, IngestionPipeline, Retriever, SplitterConfig, SqliteStore,
    TextSplitter,
};
use docent_worker::{JobStore, RunnerConfig, TaskRunner};
use tokio::sync::watch;

use crate::config::{Config, ProviderKind};
use crate::rag::RagService;

/// Everything a command needs, built once per process.
pub struct AppContext {
    config: Config,
    sqlite: SqliteStore,
    store: Arc<dyn DocumentStore>,
    provider: Arc<AnyProvider>,
    gateway: EmbeddingGateway,
    retriever: Arc<Retriever>,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("provider", &self.provider.name())
            .field("sqlite_path", &self.config.memory.sqlite_path)
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Validate the config, open the database and construct the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid, the database cannot be opened,
    /// or the provider cannot be constructed (e.g. missing API key).
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        config.validate()?;

        if let Some(parent) = std::path::Path::new(&config.memory.sqlite_path).parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let sqlite = SqliteStore::new(&config.memory.sqlite_path)
            .await
            .context("failed to open document store")?;

        let provider = Arc::new(create_provider(&config)?);
        Self::assemble(config, sqlite, provider)
    }

    /// Build from parts, skipping provider construction. Used by tests and callers
    /// that bring their own provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid.
    pub fn from_parts(
        config: Config,
        sqlite: SqliteStore,
        provider: AnyProvider,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        Self::assemble(config, sqlite, Arc::new(provider))
    }

    fn assemble(
        config: Config,
        sqlite: SqliteStore,
        provider: Arc<AnyProvider>,
    ) -> anyhow::Result<Self> {
        let store: Arc<dyn DocumentStore> = Arc::new(sqlite.clone());
        let gateway = EmbeddingGateway::new(Arc::clone(&provider), config.memory.embedding_dim);
        let retriever = Retriever::new(Arc::clone(&store), gateway.clone())
            .with_default_top_k(config.retrieval.top_k)?;
        tracing::debug!(
            provider = provider.name(),
            dimension = config.memory.embedding_dim,
            "application context ready"
        );
        Ok(Self {
            config,
            sqlite,
            store,
            provider,
            gateway,
            retriever: Arc::new(retriever),
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    #[must_use]
    pub fn catalog(&self) -> DocumentCatalog {
        DocumentCatalog::new(Arc::clone(&self.store))
    }

    #[must_use]
    pub fn retriever(&self) -> &Arc<Retriever> {
        &self.retriever
    }

    #[must_use]
    pub fn rag(&self) -> RagService {
        RagService::new(Arc::clone(&self.retriever), Arc::clone(&self.provider))
    }

    /// # Errors
    ///
    /// Returns an error if the chunk settings are invalid.
    pub fn pipeline(&self) -> anyhow::Result<IngestionPipeline> {
        let ingestion = &self.config.ingestion;
        let splitter = SplitterConfig::new(ingestion.chunk_size, ingestion.chunk_overlap)?;
        Ok(IngestionPipeline::new(
            Arc::clone(&self.store),
            self.gateway.clone(),
            TextSplitter::new(splitter),
        )
        .with_embed_concurrency(ingestion.embed_concurrency)
        .with_max_upload_bytes(ingestion.max_upload_bytes))
    }

    /// Job table on the shared database, created if missing. Lets a process queue
    /// or inspect jobs without running workers.
    ///
    /// # Errors
    ///
    /// Returns an error if the job table cannot be created.
    pub async fn jobs(&self) -> anyhow::Result<JobStore> {
        let jobs = JobStore::new(self.sqlite.pool().clone());
        jobs.init().await.context("failed to prepare job table")?;
        Ok(jobs)
    }

    /// Start the worker pool on the shared database, resuming queued jobs and
    /// jobs whose running lease expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline or the job table cannot be set up.
    pub async fn start_runner(&self, shutdown: watch::Receiver<bool>) -> anyhow::Result<TaskRunner> {
        self.runner(shutdown, true).await
    }

    /// Start workers that only process jobs submitted through the returned runner.
    /// Used by one-shot commands so they never pick up another process's work.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline or the job table cannot be set up.
    pub async fn start_submit_runner(
        &self,
        shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<TaskRunner> {
        self.runner(shutdown, false).await
    }

    async fn runner(
        &self,
        shutdown: watch::Receiver<bool>,
        resume_pending: bool,
    ) -> anyhow::Result<TaskRunner> {
        let worker = &self.config.worker;
        let runner = TaskRunner::start(
            JobStore::new(self.sqlite.pool().clone()),
            Arc::new(self.pipeline()?),
            RunnerConfig {
                workers: worker.workers,
                queue_capacity: worker.queue_capacity,
                max_attempts: worker.max_attempts,
                retry_delay: Duration::from_millis(worker.retry_delay_ms),
                resume_pending,
                running_lease: Duration::from_secs(worker.running_lease_secs),
            },
            shutdown,
        )
        .await
        .context("failed to start ingestion workers")?;
        Ok(runner)
    }
}

/// # Errors
///
/// Returns an error if the selected provider cannot be constructed.
pub fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    match config.llm.provider {
        ProviderKind::Gemini => {
            let api_key = config
                .secrets
                .gemini_api_key
                .as_ref()
                .map(|s| s.expose().to_owned())
                .unwrap_or_default();
            let provider = GeminiProvider::new(
                api_key,
                config.llm.base_url.clone(),
                config.llm.embedding_model.clone(),
                config.llm.generation_model.clone(),
            )
            .context("set DOCENT_GEMINI_API_KEY or GEMINI_API_KEY")?
            .with_max_retries(config.llm.max_retries);
            Ok(AnyProvider::Gemini(provider))
        }
        #[cfg(feature = "mock")]
        ProviderKind::Mock => Ok(AnyProvider::Mock(docent_llm::mock::MockProvider::default())),
        #[cfg(not(feature = "mock"))]
        ProviderKind::Mock => anyhow::bail!("the mock provider is not compiled in"),
    }
}
