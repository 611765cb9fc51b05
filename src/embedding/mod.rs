//! Network embedding providers and the batching generator.
//!
//! Concrete implementations of [`EmbeddingProvider`]:
//! - **[`DisabledProvider`]**: rejects every call; used when embeddings are not configured.
//! - **[`OpenAIProvider`]**: `POST https://api.openai.com/v1/embeddings`.
//! - **[`OllamaProvider`]**: `POST {url}/api/embed` on a local Ollama instance.
//!
//! Each provider makes exactly one HTTP request per call. Retry and backoff
//! live in [`EmbeddingGenerator`], which classifies failures with
//! [`RagError::is_retryable`]:
//! - HTTP 429 (rate limited), 5xx, network errors → `EmbeddingProvider` (retried)
//! - other HTTP 4xx, missing credentials, disabled provider → `EmbeddingRejected` (not retried)
//!
//! Use [`create_provider`] to pick the backend from configuration:
//!
//! ```rust,no_run
//! # use voxrag::config::EmbeddingConfig;
//! # use voxrag::embedding::create_provider;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```

mod generator;

pub use generator::{EmbeddingGenerator, EmbeddingOutcome};
pub use voxrag_core::embedding::EmbeddingProvider;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use voxrag_core::{RagError, RagResult};

use crate::config::EmbeddingConfig;

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Build the provider named by `config.provider`.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

fn http_client(config: &EmbeddingConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

/// Turn a finished HTTP exchange into vectors, classifying failures.
async fn read_response(
    label: &str,
    resp: reqwest::Result<reqwest::Response>,
    parse: fn(&Value) -> RagResult<Vec<Vec<f32>>>,
) -> RagResult<Vec<Vec<f32>>> {
    let response = resp.map_err(|e| RagError::EmbeddingProvider(format!("{}: {}", label, e)))?;
    let status = response.status();
    if status.is_success() {
        let json: Value = response.json().await.map_err(RagError::provider)?;
        return parse(&json);
    }

    let body = response.text().await.unwrap_or_default();
    let message = format!("{} API error {}: {}", label, status, body);
    if status.as_u16() == 429 || status.is_server_error() {
        Err(RagError::EmbeddingProvider(message))
    } else {
        Err(RagError::EmbeddingRejected(message))
    }
}

fn check_count(expected: usize, vectors: Vec<Vec<f32>>) -> RagResult<Vec<Vec<f32>>> {
    if vectors.len() != expected {
        return Err(RagError::EmbeddingProvider(format!(
            "expected {} embeddings, got {}",
            expected,
            vectors.len()
        )));
    }
    Ok(vectors)
}

fn json_to_vector(value: &Value) -> Option<Vec<f32>> {
    value
        .as_array()
        .map(|arr| arr.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect())
}

// ============ Disabled Provider ============

/// Rejects every embedding call.
///
/// Used when `embedding.provider = "disabled"`. Sources still load and
/// chunk, then fail at the embedding stage.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed_batch(&self, _texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        Err(RagError::EmbeddingRejected(
            "Embedding provider is disabled".to_string(),
        ))
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Requires the `OPENAI_API_KEY` environment variable at construction.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        Ok(Self {
            model,
            dims,
            api_key,
            client: http_client(config)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let resp = self
            .client
            .post(OPENAI_EMBEDDINGS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await;
        let vectors = read_response("OpenAI", resp, parse_openai_response).await?;
        check_count(texts.len(), vectors)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &Value) -> RagResult<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| RagError::provider("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let vector = item
            .get("embedding")
            .and_then(json_to_vector)
            .ok_or_else(|| RagError::provider("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, vector));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Requires Ollama to be running with an embedding model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaProvider {
    model: String,
    dims: usize,
    url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

        Ok(Self {
            model,
            dims,
            url: url.trim_end_matches('/').to_string(),
            client: http_client(config)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let resp = self
            .client
            .post(format!("{}/api/embed", self.url))
            .json(&body)
            .send()
            .await;
        let vectors = read_response("Ollama", resp, parse_ollama_response).await?;
        check_count(texts.len(), vectors)
    }
}

fn parse_ollama_response(json: &Value) -> RagResult<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| RagError::provider("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|e| {
            json_to_vector(e).ok_or_else(|| {
                RagError::provider("Invalid Ollama response: embedding is not an array")
            })
        })
        .collect()
}
