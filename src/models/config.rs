use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_EMBEDDING_URL: &str = "http://localhost:11411";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "documents";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 1024;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            return Ok(config);
        }
        Ok(Self::default())
    }

    /// Persist the configuration as pretty-printed TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check cross-field invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.indexing.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "indexing.chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.indexing.chunk_overlap >= self.indexing.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "indexing.chunk_overlap ({}) must be smaller than indexing.chunk_size ({})",
                self.indexing.chunk_overlap, self.indexing.chunk_size
            )));
        }
        if self.indexing.workers == 0 {
            return Err(ConfigError::ValidationError(
                "indexing.workers must be greater than zero".to_string(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimension must be greater than zero".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.batch_size must be greater than zero".to_string(),
            ));
        }
        if self.embedding.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.max_attempts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for the embedding provider and its retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub url: String,

    /// Fixed dimensionality of produced vectors.
    #[serde(default = "default_dimension")]
    pub dimension: u32,

    /// Chunks per embedding call.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Request timeout; a timeout counts as a transient failure.
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Attempt budget for transient failures, including the first attempt.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Entry capacity of the content-addressed embedding cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_batch_size() -> u32 {
    8
}

fn default_embedding_timeout() -> u64 {
    120
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_cache_capacity() -> usize {
    1000
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            dimension: default_dimension(),
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key: None,
        }
    }
}

/// Settings for chunking and pipeline scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Chunk window size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Characters of shared context between adjacent chunks. Must be
    /// smaller than `chunk_size`.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,

    /// Worker tasks processing documents in parallel.
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Timeout on the extraction call; a timeout is a terminal failure.
    #[serde(default = "default_extraction_timeout")]
    pub extraction_timeout_secs: u64,
}

fn default_chunk_size() -> u32 {
    1000
}

fn default_chunk_overlap() -> u32 {
    200
}

fn default_workers() -> u32 {
    4
}

fn default_extraction_timeout() -> u64 {
    60
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            workers: default_workers(),
            extraction_timeout_secs: default_extraction_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: u32,

    #[serde(default = "default_threshold")]
    pub default_threshold: f32,
}

fn default_top_k() -> u32 {
    20
}

fn default_threshold() -> f32 {
    0.7
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            default_threshold: default_threshold(),
        }
    }
}
