//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use voxrag::config::Config;
use voxrag::service::RagService;
use voxrag_core::config_store::memory::InMemoryConfigStore;
use voxrag_core::config_store::ConfigStore;
use voxrag_core::embedding::EmbeddingProvider;
use voxrag_core::models::{
    DataSource, DataSourceDescriptor, DataSourceKind, EmbeddingRecord, QueryMatch, StoredText,
};
use voxrag_core::store::memory::InMemoryVectorStore;
use voxrag_core::store::VectorStore;
use voxrag_core::{RagError, RagResult};

pub const DIMS: usize = 512;

/// Bag-of-words embedder: every new lowercase alphanumeric token gets the
/// next dimension. Texts containing `explode` fail.
#[derive(Default)]
pub struct VocabProvider {
    vocab: Mutex<HashMap<String, usize>>,
    pub calls: AtomicUsize,
}

impl VocabProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; DIMS];
        let mut vocab = self.vocab.lock().unwrap();
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let next = vocab.len();
            let index = *vocab.entry(token.to_lowercase()).or_insert(next);
            vector[index % DIMS] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for VocabProvider {
    fn model_name(&self) -> &str {
        "vocab"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if texts.iter().any(|t| t.contains("explode")) {
            return Err(RagError::EmbeddingProvider("provider unavailable".into()));
        }
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Fails (retryably) every batch whose first text starts one of `bad_rows`.
pub struct FailingRowsProvider {
    inner: VocabProvider,
    bad_rows: Vec<&'static str>,
    pub calls: AtomicUsize,
}

impl FailingRowsProvider {
    pub fn new(bad_rows: Vec<&'static str>) -> Self {
        Self {
            inner: VocabProvider::new(),
            bad_rows,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FailingRowsProvider {
    fn model_name(&self) -> &str {
        "failing-rows"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let first = texts.first().map(String::as_str).unwrap_or_default();
        if self.bad_rows.iter().any(|row| first.starts_with(row)) {
            return Err(RagError::EmbeddingProvider("503 service unavailable".into()));
        }
        self.inner.embed_batch(texts).await
    }
}

/// In-memory vector store whose `drop_collection` always fails, as a
/// backend with a dead connection would.
#[derive(Default)]
pub struct DropFailsStore {
    inner: InMemoryVectorStore,
}

#[async_trait]
impl VectorStore for DropFailsStore {
    async fn ensure_collection(&self, name: &str) -> RagResult<()> {
        self.inner.ensure_collection(name).await
    }

    async fn drop_collection(&self, _name: &str) -> RagResult<bool> {
        Err(RagError::Store("transport down".into()))
    }

    async fn upsert(&self, collection: &str, records: &[EmbeddingRecord]) -> RagResult<()> {
        self.inner.upsert(collection, records).await
    }

    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> RagResult<Vec<QueryMatch>> {
        self.inner.query(collection, vector, k).await
    }

    async fn scan(&self, collection: &str, limit: usize) -> RagResult<Vec<StoredText>> {
        self.inner.scan(collection, limit).await
    }

    async fn count(&self, collection: &str) -> RagResult<u64> {
        self.inner.count(collection).await
    }
}

/// Defaults with one row per tabular chunk and millisecond backoff.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.chunking.tabular_rows_per_chunk = 1;
    config.embedding.backoff_base_ms = 1;
    config
}

pub struct Harness {
    pub service: Arc<RagService>,
    pub config_store: Arc<InMemoryConfigStore>,
    pub vector_store: Arc<InMemoryVectorStore>,
}

pub async fn open_with(config: Config, provider: Arc<dyn EmbeddingProvider>) -> Harness {
    open_on(
        config,
        Arc::new(InMemoryConfigStore::new()),
        Arc::new(InMemoryVectorStore::new()),
        provider,
    )
    .await
}

pub async fn open_on(
    config: Config,
    config_store: Arc<InMemoryConfigStore>,
    vector_store: Arc<InMemoryVectorStore>,
    provider: Arc<dyn EmbeddingProvider>,
) -> Harness {
    let service = RagService::open(
        config,
        config_store.clone() as Arc<dyn ConfigStore>,
        vector_store.clone(),
        provider,
    )
    .await
    .unwrap();
    Harness {
        service,
        config_store,
        vector_store,
    }
}

pub fn descriptor(name: &str, kind: DataSourceKind, location: &Path) -> DataSourceDescriptor {
    DataSourceDescriptor {
        name: name.to_string(),
        kind,
        location: location.display().to_string(),
        credentials: Default::default(),
    }
}

/// Create a source and wait for its run to settle.
pub async fn add_and_settle(service: &Arc<RagService>, desc: DataSourceDescriptor) -> DataSource {
    let created = service.create_data_source(desc).await.unwrap();
    settle(service, &created.id).await
}

pub async fn settle(service: &Arc<RagService>, id: &str) -> DataSource {
    service
        .wait_until_settled(id, Duration::from_millis(10), Duration::from_secs(10))
        .await
        .unwrap()
}

pub fn people_csv(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("people.csv");
    std::fs::write(
        &path,
        "name,role\nSarah Chen,Engineer\nMark Lee,Designer\nPriya Patel,Manager\n",
    )
    .unwrap();
    path
}

/// `rows` lines of `Row N: item: itemN`.
pub fn numbered_csv(dir: &Path, rows: usize) -> std::path::PathBuf {
    let path = dir.join("numbered.csv");
    let mut body = String::from("item\n");
    for i in 1..=rows {
        body.push_str(&format!("item{}\n", i));
    }
    std::fs::write(&path, body).unwrap();
    path
}
