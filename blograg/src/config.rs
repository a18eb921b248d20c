//! Runtime settings loaded from the environment
//!
//! Values come from process environment variables, with a `.env` file in the
//! working directory consulted as a fallback.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use blograg_cache::{CacheConfig, LockConfig, SemanticCacheConfig};

use crate::error::{RagError, Result};
use crate::search::chunker::ChunkingConfig;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_LLM_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_EMBEDDING_MODEL: &str = "openai/text-embedding-3-small";

/// Where embeddings are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbeddingBackend {
    /// OpenAI-compatible `/embeddings` endpoint
    #[default]
    Remote,
    /// Local fastembed model
    Local,
}

impl FromStr for EmbeddingBackend {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(Self::Remote),
            "local" => Ok(Self::Local),
            other => Err(RagError::Config(format!(
                "EMBEDDING_BACKEND must be 'remote' or 'local', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,
    pub embedding_model: String,
    pub embedding_backend: EmbeddingBackend,
    /// LanceDB location
    pub data_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Chunks retrieved per question
    pub top_k: usize,
    pub exact_ttl: Duration,
    pub lock_ttl: Duration,
    /// Maximum cosine distance for a semantic cache hit
    pub semantic_threshold: f32,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            llm_base_url: DEFAULT_BASE_URL.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_backend: EmbeddingBackend::Remote,
            data_dir: default_data_dir(),
            chunk_size: 800,
            chunk_overlap: 150,
            top_k: 8,
            exact_ttl: Duration::from_secs(7200),
            lock_ttl: Duration::from_secs(60),
            semantic_threshold: 0.2,
            temperature: 0.0,
            max_tokens: 1000,
            request_timeout: Duration::from_secs(25),
        }
    }
}

impl Settings {
    /// Load settings from the environment and `.env`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let settings = Self {
            api_key: var("OPENROUTER_API_KEY"),
            llm_base_url: var("LLM_BASE_URL").unwrap_or(defaults.llm_base_url),
            llm_model: var("LLM_MODEL").unwrap_or(defaults.llm_model),
            embedding_model: var("EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            embedding_backend: match var("EMBEDDING_BACKEND") {
                Some(v) => v.parse()?,
                None => defaults.embedding_backend,
            },
            data_dir: var("BLOGRAG_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            chunk_size: parse_var(&var, "BLOGRAG_CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: parse_var(&var, "BLOGRAG_CHUNK_OVERLAP", defaults.chunk_overlap)?,
            top_k: parse_var(&var, "BLOGRAG_TOP_K", defaults.top_k)?,
            exact_ttl: Duration::from_secs(parse_var(
                &var,
                "BLOGRAG_EXACT_TTL_SECS",
                defaults.exact_ttl.as_secs(),
            )?),
            lock_ttl: Duration::from_secs(parse_var(
                &var,
                "BLOGRAG_LOCK_TTL_SECS",
                defaults.lock_ttl.as_secs(),
            )?),
            semantic_threshold: parse_var(
                &var,
                "BLOGRAG_SEMANTIC_THRESHOLD",
                defaults.semantic_threshold,
            )?,
            request_timeout: Duration::from_secs(parse_var(
                &var,
                "BLOGRAG_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            ..defaults
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.chunking().validate()?;

        if self.top_k == 0 {
            return Err(RagError::Config("BLOGRAG_TOP_K must be at least 1".into()));
        }

        if !(0.0..=2.0).contains(&self.semantic_threshold) {
            return Err(RagError::Config(format!(
                "BLOGRAG_SEMANTIC_THRESHOLD must be within [0, 2], got {}",
                self.semantic_threshold
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(RagError::Config(
                "BLOGRAG_REQUEST_TIMEOUT_SECS must be at least 1".into(),
            ));
        }

        // A lock that expires mid-synthesis lets a second request generate too
        if self.lock_ttl <= self.request_timeout * 2 {
            return Err(RagError::Config(format!(
                "BLOGRAG_LOCK_TTL_SECS ({}s) must exceed twice BLOGRAG_REQUEST_TIMEOUT_SECS ({}s)",
                self.lock_ttl.as_secs(),
                self.request_timeout.as_secs()
            )));
        }

        self.cache_config().validate().map_err(config_error)?;
        self.lock_config().validate().map_err(config_error)?;
        self.semantic_config().validate().map_err(config_error)?;
        Ok(())
    }

    /// API key for remote capabilities; missing is a configuration error
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| RagError::Config("OPENROUTER_API_KEY is not set".into()))
    }

    pub fn chunking(&self) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::builder().answer_ttl(self.exact_ttl).build()
    }

    pub fn lock_config(&self) -> LockConfig {
        LockConfig {
            lock_ttl: self.lock_ttl,
            ..LockConfig::default()
        }
    }

    pub fn semantic_config(&self) -> SemanticCacheConfig {
        SemanticCacheConfig {
            distance_threshold: self.semantic_threshold,
            ..SemanticCacheConfig::default()
        }
    }
}

pub(crate) fn config_error(e: blograg_cache::CacheError) -> RagError {
    RagError::Config(e.to_string())
}

fn parse_var<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| RagError::Config(format!("{} has invalid value '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("blograg"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}
