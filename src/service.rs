//! Data source lifecycle controller and the service facade.
//!
//! [`RagService`] owns the in-memory working set of data sources and vector
//! store records. Every mutation is written through to a [`ConfigStore`],
//! and [`RagService::open`] rehydrates the working set from it. One service
//! instance is built at startup and shared (as `Arc<RagService>`) with every
//! consumer.
//!
//! # Lifecycle
//!
//! ```text
//! create ─▶ configured ─▶ processing ─▶ ready
//!                              │
//!                              └──────▶ error
//! retry: any settled state ─▶ configured ─▶ (pipeline runs again)
//! ```
//!
//! A pipeline run is `load → chunk → embed → store`, strictly sequential,
//! on its own tokio task. A source has at most one run in flight; separate
//! sources process concurrently. Each run rebuilds the source's collection
//! from scratch, so retry is idempotent for unchanged content.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use voxrag_core::chunk::chunk_document;
use voxrag_core::config_store::ConfigStore;
use voxrag_core::embedding::EmbeddingProvider;
use voxrag_core::fuzzy::NameConfusionTable;
use voxrag_core::models::{
    collection_name_for, Chunk, CollectionPeek, ContextChunk, DataSource, DataSourceDescriptor,
    DataSourceStatus, VectorStoreRecord, VectorStoreStatus,
};
use voxrag_core::store::VectorStore;
use voxrag_core::{RagError, RagResult};

use crate::config::Config;
use crate::embedding::EmbeddingGenerator;
use crate::loader::load_documents;
use crate::retrieve::Retriever;

/// Maximum records returned by [`RagService::peek_collection`].
pub const PEEK_SAMPLE_SIZE: usize = 10;

const INTERRUPTED_MESSAGE: &str = "processing was interrupted by a restart; retry to rebuild";

pub struct RagService {
    config: Config,
    config_store: Arc<dyn ConfigStore>,
    vector_store: Arc<dyn VectorStore>,
    generator: Arc<EmbeddingGenerator>,
    retriever: Retriever,
    sources: RwLock<HashMap<String, DataSource>>,
    stores: RwLock<HashMap<String, VectorStoreRecord>>,
    in_flight: Mutex<HashSet<String>>,
}

/// Marks a source as having a run in flight until dropped.
struct InFlight {
    service: Arc<RagService>,
    id: String,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Ok(mut set) = self.service.in_flight.lock() {
            set.remove(&self.id);
        }
    }
}

impl RagService {
    /// Build the service and rehydrate its working set from `config_store`.
    ///
    /// The fuzzy tier uses the seed name-confusion table plus any
    /// `[retrieval.fuzzy.names]` entries.
    pub async fn open(
        config: Config,
        config_store: Arc<dyn ConfigStore>,
        vector_store: Arc<dyn VectorStore>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> RagResult<Arc<Self>> {
        let names = NameConfusionTable::seeded_with(&config.retrieval.fuzzy.names);
        Self::open_with_names(config, config_store, vector_store, provider, names).await
    }

    /// Like [`open`](RagService::open), with `names` as the complete
    /// name-confusion table.
    pub async fn open_with_names(
        config: Config,
        config_store: Arc<dyn ConfigStore>,
        vector_store: Arc<dyn VectorStore>,
        provider: Arc<dyn EmbeddingProvider>,
        names: NameConfusionTable,
    ) -> RagResult<Arc<Self>> {
        let generator = Arc::new(EmbeddingGenerator::new(provider, &config.embedding));
        info!(
            model = generator.provider().model_name(),
            dims = generator.provider().dims(),
            "Embedding provider configured"
        );
        let retriever = Retriever::new(
            vector_store.clone(),
            generator.clone(),
            config.retrieval.clone(),
            names,
        );

        let service = Arc::new(Self {
            config,
            config_store,
            vector_store,
            generator,
            retriever,
            sources: RwLock::new(HashMap::new()),
            stores: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
        });
        service.rehydrate().await?;
        service.resume_configured();
        Ok(service)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ═══════════════════════════════════════════════════════════════════
    // Data sources
    // ═══════════════════════════════════════════════════════════════════

    /// Register a data source and start processing it in the background.
    ///
    /// Returns the source in `configured` state; poll [`get_data_source`]
    /// (or use [`wait_until_settled`]) for the outcome.
    ///
    /// [`get_data_source`]: RagService::get_data_source
    /// [`wait_until_settled`]: RagService::wait_until_settled
    pub async fn create_data_source(
        self: &Arc<Self>,
        descriptor: DataSourceDescriptor,
    ) -> RagResult<DataSource> {
        if descriptor.name.trim().is_empty() {
            return Err(RagError::Store("data source name must not be empty".into()));
        }
        if descriptor.location.trim().is_empty() {
            return Err(RagError::Store("data source location must not be empty".into()));
        }

        let source = DataSource::from_descriptor(Uuid::new_v4().to_string(), descriptor);
        self.config_store.save_data_source(&source).await?;
        self.sources
            .write()
            .map_err(RagError::store)?
            .insert(source.id.clone(), source.clone());

        info!(source_id = %source.id, name = %source.name, kind = %source.kind, "Data source created");
        self.spawn_processing(&source.id);
        Ok(source)
    }

    /// Reset a source to `configured` and run the full pipeline again.
    ///
    /// Returns `false` for an unknown id or a source with a run in flight.
    pub async fn retry_data_source_processing(self: &Arc<Self>, id: &str) -> RagResult<bool> {
        if self.get_data_source(id).is_none() {
            return Ok(false);
        }
        let Some(guard) = self.begin(id) else {
            info!(source_id = %id, "Retry ignored; run already in flight");
            return Ok(false);
        };

        self.update_source(id, |s| {
            s.status = DataSourceStatus::Configured;
            s.error_message = None;
        })
        .await?;

        info!(source_id = %id, "Retrying data source processing");
        self.spawn_with(guard);
        Ok(true)
    }

    pub fn get_data_source(&self, id: &str) -> Option<DataSource> {
        self.sources.read().ok().and_then(|m| m.get(id).cloned())
    }

    /// All data sources, oldest first.
    pub fn list_data_sources(&self) -> Vec<DataSource> {
        let mut sources: Vec<DataSource> = self
            .sources
            .read()
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        sources.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        sources
    }

    /// Remove a settled data source, its vector store record, and its collection.
    ///
    /// Returns `false` for an unknown id. A source with a run in flight is
    /// refused with [`RagError::ProcessingFailed`].
    pub async fn delete_data_source(self: &Arc<Self>, id: &str) -> RagResult<bool> {
        if self.get_data_source(id).is_none() {
            return Ok(false);
        }
        let Some(_guard) = self.begin(id) else {
            return Err(RagError::ProcessingFailed(format!(
                "data source {} is processing; delete it once it settles",
                id
            )));
        };

        if let Some(store) = self.vector_store_for_source(id) {
            self.vector_store.drop_collection(&store.collection_name).await?;
            self.config_store.delete_vector_store(&store.id).await?;
            self.stores.write().map_err(RagError::store)?.remove(&store.id);
        }
        self.config_store.delete_data_source(id).await?;
        self.sources.write().map_err(RagError::store)?.remove(id);

        info!(source_id = %id, "Data source deleted");
        Ok(true)
    }

    /// Whether a pipeline run is in flight for `id`.
    pub fn is_processing(&self, id: &str) -> bool {
        self.in_flight
            .lock()
            .map(|set| set.contains(id))
            .unwrap_or(false)
    }

    /// Poll until `id` reaches `ready` or `error` with no run in flight.
    pub async fn wait_until_settled(
        &self,
        id: &str,
        poll: Duration,
        timeout: Duration,
    ) -> RagResult<DataSource> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let source = self
                .get_data_source(id)
                .ok_or_else(|| RagError::NotFound(id.to_string()))?;
            if source.status.is_terminal() && !self.is_processing(id) {
                return Ok(source);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(RagError::ProcessingFailed(format!(
                    "timed out waiting for data source {} (status {})",
                    id, source.status
                )));
            }
            tokio::time::sleep(poll).await;
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Vector stores and retrieval
    // ═══════════════════════════════════════════════════════════════════

    pub fn get_vector_store(&self, id: &str) -> Option<VectorStoreRecord> {
        self.stores.read().ok().and_then(|m| m.get(id).cloned())
    }

    /// All vector store records, oldest first.
    pub fn list_vector_stores(&self) -> Vec<VectorStoreRecord> {
        let mut stores: Vec<VectorStoreRecord> = self
            .stores
            .read()
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        stores.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        stores
    }

    /// The vector store record owned by a data source.
    pub fn vector_store_for_source(&self, data_source_id: &str) -> Option<VectorStoreRecord> {
        self.stores.read().ok().and_then(|m| {
            m.values()
                .find(|s| s.data_source_id == data_source_id)
                .cloned()
        })
    }

    /// Context for one conversational turn. Never fails; see [`Retriever`].
    pub async fn retrieve_context(&self, query: &str, vector_store_id: &str) -> Vec<ContextChunk> {
        match self.get_vector_store(vector_store_id) {
            Some(store) => self.retriever.retrieve(query, &store).await,
            None => {
                warn!(vector_store = %vector_store_id, "Unknown vector store; no context");
                Vec::new()
            }
        }
    }

    /// Count plus up to [`PEEK_SAMPLE_SIZE`] sample records of a collection.
    pub async fn peek_collection(&self, vector_store_id: &str) -> RagResult<CollectionPeek> {
        let store = self
            .get_vector_store(vector_store_id)
            .ok_or_else(|| RagError::NotFound(vector_store_id.to_string()))?;

        let count = self.vector_store.count(&store.collection_name).await?;
        let sample = self
            .vector_store
            .scan(&store.collection_name, PEEK_SAMPLE_SIZE)
            .await?;
        let (documents, metadatas) = sample.into_iter().map(|r| (r.text, r.metadata)).unzip();

        Ok(CollectionPeek {
            count,
            documents,
            metadatas,
        })
    }

    // ═══════════════════════════════════════════════════════════════════
    // Pipeline
    // ═══════════════════════════════════════════════════════════════════

    /// Claim the in-flight slot for `id`; `None` if a run already holds it.
    fn begin(self: &Arc<Self>, id: &str) -> Option<InFlight> {
        let mut set = self.in_flight.lock().ok()?;
        if !set.insert(id.to_string()) {
            return None;
        }
        Some(InFlight {
            service: Arc::clone(self),
            id: id.to_string(),
        })
    }

    /// Start runs for sources that were created but never picked up.
    fn resume_configured(self: &Arc<Self>) {
        for source in self.list_data_sources() {
            if source.status == DataSourceStatus::Configured {
                info!(source_id = %source.id, "Resuming pending data source");
                self.spawn_processing(&source.id);
            }
        }
    }

    fn spawn_processing(self: &Arc<Self>, id: &str) -> Option<JoinHandle<()>> {
        let guard = self.begin(id)?;
        Some(self.spawn_with(guard))
    }

    fn spawn_with(self: &Arc<Self>, guard: InFlight) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let id = guard.id.clone();
            if let Err(e) = service.process_data_source(&id).await {
                error!(source_id = %id, error = %e, "Could not record processing outcome");
            }
            drop(guard);
        })
    }

    /// Run the full pipeline for one source and record its terminal state.
    ///
    /// Every failure after the source is claimed (resetting the collection,
    /// the pipeline itself, or recording success) is recorded on the source
    /// as status `error` and is not returned; only failures to persist that
    /// error are.
    async fn process_data_source(&self, id: &str) -> RagResult<()> {
        let claimed = self
            .update_source(id, |s| {
                s.status = DataSourceStatus::Processing;
                s.error_message = None;
            })
            .await;
        let outcome = match claimed {
            Ok(source) => {
                info!(source_id = %id, "Processing data source");
                self.build_collection(&source).await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            self.record_failure(id, &e).await?;
        }
        Ok(())
    }

    async fn build_collection(&self, source: &DataSource) -> RagResult<()> {
        let store = self.prepare_vector_store(source).await?;
        let stored = self.run_pipeline(source, &store).await?;

        let vector_count = self
            .vector_store
            .count(&store.collection_name)
            .await
            .unwrap_or(stored);
        self.update_store(&store.id, |s| {
            s.status = VectorStoreStatus::Ready;
            s.vector_count = vector_count;
        })
        .await?;
        self.update_source(&source.id, |s| {
            s.status = DataSourceStatus::Ready;
            s.document_count = stored;
            s.last_processed_at = Some(Utc::now());
        })
        .await?;
        info!(source_id = %source.id, chunks = stored, "Data source ready");
        Ok(())
    }

    /// Move the source to `error`, and its vector store too when one exists.
    ///
    /// The in-memory record changes even if the config store write fails.
    async fn record_failure(&self, id: &str, cause: &RagError) -> RagResult<()> {
        let message = cause.to_string();
        warn!(source_id = %id, error = %message, "Data source processing failed");

        if let Some(store) = self.vector_store_for_source(id) {
            if let Err(e) = self
                .update_store(&store.id, |s| s.status = VectorStoreStatus::Error)
                .await
            {
                warn!(vector_store = %store.id, error = %e, "Could not mark vector store failed");
            }
        }
        self.update_source(id, |s| {
            s.status = DataSourceStatus::Error;
            s.error_message = Some(message);
        })
        .await?;
        Ok(())
    }

    /// Find or create the source's vector store record and reset its collection.
    async fn prepare_vector_store(&self, source: &DataSource) -> RagResult<VectorStoreRecord> {
        let collection = collection_name_for(&source.id);
        // Recreating the collection discards the previous run's records and
        // its fixed dimensionality.
        self.vector_store.drop_collection(&collection).await?;
        self.vector_store.ensure_collection(&collection).await?;

        if let Some(existing) = self.vector_store_for_source(&source.id) {
            return self
                .update_store(&existing.id, |s| {
                    s.status = VectorStoreStatus::Configured;
                    s.vector_count = 0;
                    s.collection_name = collection.clone();
                })
                .await;
        }

        let now = Utc::now();
        let record = VectorStoreRecord {
            id: Uuid::new_v4().to_string(),
            name: format!("{} store", source.name),
            data_source_id: source.id.clone(),
            collection_name: collection,
            status: VectorStoreStatus::Configured,
            vector_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.config_store.save_vector_store(&record).await?;
        self.stores
            .write()
            .map_err(RagError::store)?
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    /// `load → chunk → embed → store`. Returns the number of records stored.
    async fn run_pipeline(&self, source: &DataSource, store: &VectorStoreRecord) -> RagResult<u64> {
        let loader_config = self.config.loader.clone();
        let owned = source.clone();
        let documents = tokio::task::spawn_blocking(move || load_documents(&owned, &loader_config))
            .await
            .map_err(|e| RagError::ProcessingFailed(format!("loader task failed: {}", e)))??;

        let chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|doc| chunk_document(doc, &self.config.chunking))
            .collect();
        info!(
            source_id = %source.id,
            documents = documents.len(),
            chunks = chunks.len(),
            "Chunked data source"
        );
        if chunks.is_empty() {
            return Ok(0);
        }

        let outcome = self.generator.embed_chunks(&chunks).await;
        if outcome.all_failed() {
            return Err(RagError::EmbeddingProvider(format!(
                "all {} embedding batches failed",
                outcome.batches
            )));
        }
        if outcome.failed_batches > 0 {
            warn!(
                source_id = %source.id,
                requested = outcome.requested,
                succeeded = outcome.succeeded(),
                failed_batches = outcome.failed_batches,
                "Partial embedding; continuing with the batches that succeeded"
            );
        }

        for batch in outcome.records.chunks(self.generator.batch_size()) {
            self.vector_store.upsert(&store.collection_name, batch).await?;
        }
        Ok(outcome.succeeded() as u64)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Write-through helpers
    // ═══════════════════════════════════════════════════════════════════

    async fn update_source<F>(&self, id: &str, apply: F) -> RagResult<DataSource>
    where
        F: FnOnce(&mut DataSource),
    {
        let updated = {
            let mut sources = self.sources.write().map_err(RagError::store)?;
            let source = sources
                .get_mut(id)
                .ok_or_else(|| RagError::NotFound(id.to_string()))?;
            apply(source);
            source.updated_at = Utc::now();
            source.clone()
        };
        self.config_store.save_data_source(&updated).await?;
        Ok(updated)
    }

    async fn update_store<F>(&self, id: &str, apply: F) -> RagResult<VectorStoreRecord>
    where
        F: FnOnce(&mut VectorStoreRecord),
    {
        let updated = {
            let mut stores = self.stores.write().map_err(RagError::store)?;
            let store = stores
                .get_mut(id)
                .ok_or_else(|| RagError::NotFound(id.to_string()))?;
            apply(store);
            store.updated_at = Utc::now();
            store.clone()
        };
        self.config_store.save_vector_store(&updated).await?;
        Ok(updated)
    }

    /// Load the working set from the config store and repair stale state.
    ///
    /// Sources left in `processing` by a previous process are moved to
    /// `error`; sources still `configured` are picked up by
    /// `resume_configured` once the service is built. Ready vector stores
    /// are checked against the vector store; a missing collection marks the
    /// store and its source `error`.
    async fn rehydrate(&self) -> RagResult<()> {
        let sources = self.config_store.load_data_sources().await?;
        let stores = self.config_store.load_vector_stores().await?;
        info!(
            sources = sources.len(),
            vector_stores = stores.len(),
            "Rehydrating from config store"
        );

        {
            let mut map = self.sources.write().map_err(RagError::store)?;
            map.extend(sources.into_iter().map(|s| (s.id.clone(), s)));
        }
        {
            let mut map = self.stores.write().map_err(RagError::store)?;
            map.extend(stores.into_iter().map(|s| (s.id.clone(), s)));
        }

        for source in self.list_data_sources() {
            if source.status == DataSourceStatus::Processing {
                warn!(source_id = %source.id, "Found interrupted run; marking error");
                self.update_source(&source.id, |s| {
                    s.status = DataSourceStatus::Error;
                    s.error_message = Some(INTERRUPTED_MESSAGE.to_string());
                })
                .await?;
            }
        }

        for store in self.list_vector_stores() {
            if store.status != VectorStoreStatus::Ready {
                continue;
            }
            match self.vector_store.count(&store.collection_name).await {
                Ok(count) => {
                    if count != store.vector_count {
                        self.update_store(&store.id, |s| s.vector_count = count).await?;
                    }
                }
                Err(RagError::CollectionNotFound(_)) => {
                    warn!(
                        vector_store = %store.id,
                        collection = %store.collection_name,
                        "Ready vector store has no collection; marking error"
                    );
                    self.update_store(&store.id, |s| s.status = VectorStoreStatus::Error)
                        .await?;
                    let message = format!(
                        "collection {} is missing; retry to rebuild",
                        store.collection_name
                    );
                    if self.get_data_source(&store.data_source_id).is_some() {
                        self.update_source(&store.data_source_id, |s| {
                            s.status = DataSourceStatus::Error;
                            s.error_message = Some(message);
                        })
                        .await?;
                    }
                }
                Err(e) => {
                    warn!(vector_store = %store.id, error = %e, "Could not verify collection");
                }
            }
        }
        Ok(())
    }
}
