//! Two-tier context retrieval.
//!
//! 1. Embed the query and take the `top_k` nearest records.
//! 2. Drop hits farther than `max_distance`.
//! 3. If nothing survives, scan up to `fuzzy_pool_size` records and keep the
//!    `fuzzy_top_n` best fuzzy matches.
//!
//! The fuzzy tier recovers proper nouns that speech-to-text misspelled
//! ("Sarah Chin" for "Sarah Chen"): the misspelling ruins embedding
//! similarity but stays close in edit distance.
//!
//! Every failure degrades to an empty result with a warning. Callers get
//! "no context", never an error.

use std::sync::Arc;

use tracing::{debug, warn};
use voxrag_core::fuzzy::{FuzzyMatcher, NameConfusionTable};
use voxrag_core::models::{
    ContextChunk, Metadata, RetrievalPath, VectorStoreRecord, VectorStoreStatus, META_DATA_SOURCE_ID,
    META_SOURCE,
};
use voxrag_core::store::VectorStore;
use voxrag_core::{RagError, RagResult};

use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingGenerator;

fn ensure_ready(store: &VectorStoreRecord) -> RagResult<()> {
    if store.status == VectorStoreStatus::Ready {
        Ok(())
    } else {
        Err(RagError::StoreNotReady(store.id.clone()))
    }
}

/// Label used when a record carries no `source` metadata.
pub const UNKNOWN_SOURCE: &str = "Unknown source";

pub struct Retriever {
    store: Arc<dyn VectorStore>,
    generator: Arc<EmbeddingGenerator>,
    matcher: FuzzyMatcher,
    config: RetrievalConfig,
}

impl Retriever {
    /// `names` is the complete name-confusion table for the fuzzy tier.
    pub fn new(
        store: Arc<dyn VectorStore>,
        generator: Arc<EmbeddingGenerator>,
        config: RetrievalConfig,
        names: NameConfusionTable,
    ) -> Self {
        let matcher = FuzzyMatcher::new(names, config.fuzzy.clone());
        debug!(names = matcher.table().len(), "Name-confusion table loaded");
        Self {
            store,
            generator,
            matcher,
            config,
        }
    }

    /// Retrieve labeled context for `query` from the collection behind `store`.
    pub async fn retrieve(&self, query: &str, store: &VectorStoreRecord) -> Vec<ContextChunk> {
        if let Err(e) = ensure_ready(store) {
            warn!(status = %store.status, error = %e, "Skipping retrieval");
            return Vec::new();
        }
        if query.trim().is_empty() {
            return Vec::new();
        }

        let vector = match self.generator.embed_query(query).await {
            Ok(v) => v,
            Err(e) => {
                warn!(vector_store = %store.id, error = %e, "Query embedding failed");
                return Vec::new();
            }
        };

        let hits = match self
            .store
            .query(&store.collection_name, &vector, self.config.top_k)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!(collection = %store.collection_name, error = %e, "Semantic query failed");
                return Vec::new();
            }
        };

        let semantic: Vec<ContextChunk> = hits
            .into_iter()
            .filter(|hit| hit.distance <= self.config.max_distance)
            .map(|hit| {
                to_context(
                    hit.text,
                    &hit.metadata,
                    1.0 - hit.distance,
                    RetrievalPath::Semantic,
                    &store.id,
                )
            })
            .collect();

        if !semantic.is_empty() {
            debug!(vector_store = %store.id, results = semantic.len(), "Semantic retrieval");
            return semantic;
        }

        self.fuzzy_fallback(query, store).await
    }

    async fn fuzzy_fallback(&self, query: &str, store: &VectorStoreRecord) -> Vec<ContextChunk> {
        let pool = match self
            .store
            .scan(&store.collection_name, self.config.fuzzy_pool_size)
            .await
        {
            Ok(pool) => pool,
            Err(e) => {
                warn!(collection = %store.collection_name, error = %e, "Fuzzy scan failed");
                return Vec::new();
            }
        };

        let texts: Vec<&str> = pool.iter().map(|r| r.text.as_str()).collect();
        let results: Vec<ContextChunk> = self
            .matcher
            .rank(query, &texts)
            .into_iter()
            .take(self.config.fuzzy_top_n)
            .map(|m| {
                to_context(
                    m.text,
                    &pool[m.index].metadata,
                    m.score,
                    RetrievalPath::Fuzzy,
                    &store.id,
                )
            })
            .collect();

        debug!(
            vector_store = %store.id,
            pool = pool.len(),
            results = results.len(),
            "Fuzzy fallback retrieval"
        );
        results
    }
}

fn to_context(
    content: String,
    metadata: &Metadata,
    score: f32,
    path: RetrievalPath,
    vector_store_id: &str,
) -> ContextChunk {
    let text_field = |key: &str| metadata.get(key).and_then(|v| v.as_str()).map(str::to_string);
    ContextChunk {
        content,
        source: text_field(META_SOURCE).unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
        data_source_id: text_field(META_DATA_SOURCE_ID)
            .unwrap_or_else(|| vector_store_id.to_string()),
        score,
        path,
    }
}
