use std::str::FromStr;

use super::{Config, ProviderKind, Secret};

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    if let Ok(parsed) = v.trim().parse::<T>() {
        Some(parsed)
    } else {
        tracing::warn!("ignoring invalid {key} value: {v}");
        None
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DOCENT_LLM_PROVIDER") {
            match v.trim().to_ascii_lowercase().as_str() {
                "gemini" => self.llm.provider = ProviderKind::Gemini,
                "mock" => self.llm.provider = ProviderKind::Mock,
                _ => tracing::warn!("ignoring invalid DOCENT_LLM_PROVIDER value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("DOCENT_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("DOCENT_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("DOCENT_GENERATION_MODEL") {
            self.llm.generation_model = v;
        }
        if let Ok(v) = std::env::var("DOCENT_SQLITE_PATH") {
            self.memory.sqlite_path = v;
        }
        if let Some(dim) = parse_env("DOCENT_EMBEDDING_DIM") {
            self.memory.embedding_dim = dim;
        }
        if let Some(size) = parse_env("DOCENT_CHUNK_SIZE") {
            self.ingestion.chunk_size = size;
        }
        if let Some(overlap) = parse_env("DOCENT_CHUNK_OVERLAP") {
            self.ingestion.chunk_overlap = overlap;
        }
        if let Some(n) = parse_env("DOCENT_EMBED_CONCURRENCY") {
            self.ingestion.embed_concurrency = n;
        }
        if let Some(bytes) = parse_env("DOCENT_MAX_UPLOAD_BYTES") {
            self.ingestion.max_upload_bytes = bytes;
        }
        if let Some(k) = parse_env("DOCENT_TOP_K") {
            self.retrieval.top_k = k;
        }
        if let Some(n) = parse_env("DOCENT_WORKERS") {
            self.worker.workers = n;
        }
        if let Some(secs) = parse_env("DOCENT_STALE_AFTER_SECS") {
            self.reconcile.stale_after_secs = secs;
        }

        let key = std::env::var("DOCENT_GEMINI_API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty());
        if let Some(key) = key {
            self.secrets.gemini_api_key = Some(Secret::new(key));
        }
    }
}
