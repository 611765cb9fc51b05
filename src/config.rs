use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use voxrag_core::chunk::ChunkingConfig;
pub use voxrag_core::fuzzy::FuzzyConfig;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/voxrag.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    50
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    1000
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Semantic hits farther than this cosine distance are discarded.
    #[serde(default = "default_max_distance")]
    pub max_distance: f32,
    #[serde(default = "default_fuzzy_pool_size")]
    pub fuzzy_pool_size: usize,
    #[serde(default = "default_fuzzy_top_n")]
    pub fuzzy_top_n: usize,
    #[serde(default)]
    pub fuzzy: FuzzyConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_distance: default_max_distance(),
            fuzzy_pool_size: default_fuzzy_pool_size(),
            fuzzy_top_n: default_fuzzy_top_n(),
            fuzzy: FuzzyConfig::default(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_max_distance() -> f32 {
    0.8
}
fn default_fuzzy_pool_size() -> usize {
    100
}
fn default_fuzzy_top_n() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoaderConfig {
    /// Base directory that relative data source locations resolve against.
    #[serde(default)]
    pub upload_dir: Option<PathBuf>,
    /// Files larger than this are skipped during directory loads.
    #[serde(default)]
    pub max_file_bytes: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.text_chunk_size == 0 || self.chunking.structured_chunk_size == 0 {
            anyhow::bail!("chunking chunk sizes must be > 0");
        }
        if self.chunking.text_overlap >= self.chunking.text_chunk_size {
            anyhow::bail!("chunking.text_overlap must be smaller than text_chunk_size");
        }
        if self.chunking.structured_overlap >= self.chunking.structured_chunk_size {
            anyhow::bail!("chunking.structured_overlap must be smaller than structured_chunk_size");
        }
        if self.chunking.tabular_rows_per_chunk == 0 {
            anyhow::bail!("chunking.tabular_rows_per_chunk must be > 0");
        }

        if self.retrieval.top_k == 0 {
            anyhow::bail!("retrieval.top_k must be >= 1");
        }
        if !(0.0..=2.0).contains(&self.retrieval.max_distance) {
            anyhow::bail!("retrieval.max_distance must be in [0.0, 2.0]");
        }
        if !(0.0..=1.0).contains(&self.retrieval.fuzzy.min_score) {
            anyhow::bail!("retrieval.fuzzy.min_score must be in [0.0, 1.0]");
        }
        if self.retrieval.fuzzy.names.keys().any(|name| name.trim().is_empty()) {
            anyhow::bail!("retrieval.fuzzy.names keys must be non-empty");
        }

        if self.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }
        if self.embedding.is_enabled() {
            if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    self.embedding.provider
                );
            }
            if self.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    self.embedding.provider
                );
            }
        }
        match self.embedding.provider.as_str() {
            "disabled" | "openai" | "ollama" => {}
            other => anyhow::bail!(
                "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
                other
            ),
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}
