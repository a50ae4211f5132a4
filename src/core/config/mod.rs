//! Runtime settings.
//!
//! Settings come from an optional TOML file merged with environment
//! overrides. Every knob has a working default so the pipeline can run
//! without any configuration at all.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{ForecastError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub llm: LlmSettings,
    pub cache: CacheSettings,
    pub rag: RagSettings,
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Base URL of an OpenAI-compatible server (e.g. Ollama, LM Studio).
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f64,
    pub request_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            temperature: 0.2,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub dir: PathBuf,
    pub user_agent: String,
    pub fetch_timeout_secs: u64,
    /// Upper bound on simultaneous document downloads per request.
    pub fetch_concurrency: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/cache"),
            user_agent: "ForecastGPT/1.0".to_string(),
            fetch_timeout_secs: 60,
            fetch_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// Chunk window in characters.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    pub top_k: usize,
    /// Budget for the assembled prompt context, in characters.
    pub max_context_length: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            chunk_size: 900,
            chunk_overlap: 150,
            top_k: 5,
            max_context_length: 4000,
        }
    }
}

impl Settings {
    /// Load settings from `FORECASTGPT_CONFIG` (or the given path),
    /// falling back to defaults when no file exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match env::var("FORECASTGPT_CONFIG") {
                Ok(p) => PathBuf::from(p),
                Err(_) => return Ok(Self::default().with_env_overrides()),
            },
        };

        if !path.exists() {
            return Ok(Self::default().with_env_overrides());
        }

        let content = std::fs::read_to_string(&path)?;
        let settings: Settings =
            toml::from_str(&content).map_err(|e| ForecastError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = env::var("FORECASTGPT_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Ok(model) = env::var("FORECASTGPT_CHAT_MODEL") {
            self.llm.chat_model = model;
        }
        if let Ok(model) = env::var("FORECASTGPT_EMBED_MODEL") {
            self.llm.embedding_model = model;
        }
        if let Ok(dir) = env::var("FORECASTGPT_CACHE_DIR") {
            self.cache.dir = PathBuf::from(dir);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.rag.chunk_size == 0 {
            return Err(ForecastError::Config("chunk_size must be > 0".to_string()));
        }
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(ForecastError::Config(
                "chunk_overlap must be smaller than chunk_size".to_string(),
            ));
        }
        if self.cache.fetch_concurrency == 0 {
            return Err(ForecastError::Config(
                "fetch_concurrency must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
