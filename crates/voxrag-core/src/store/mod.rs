//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is a thin interface over a vector database:
//! named collections of [`EmbeddingRecord`]s with nearest-neighbor query
//! and raw scan. Each data source owns exactly one collection.
//!
//! Implementations must be `Send + Sync` to work with async runtimes, and
//! must enforce one dimensionality per collection (the first upsert fixes
//! it; later mismatches fail with [`RagError::DimensionMismatch`]).
//!
//! [`RagError::DimensionMismatch`]: crate::RagError::DimensionMismatch

pub mod memory;

use async_trait::async_trait;

use crate::error::RagResult;
use crate::models::{EmbeddingRecord, QueryMatch, StoredText};

/// Abstract vector database.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_collection`](VectorStore::ensure_collection) | Create a collection if absent |
/// | [`drop_collection`](VectorStore::drop_collection) | Remove a collection and its records |
/// | [`upsert`](VectorStore::upsert) | Write records (atomic per call) |
/// | [`query`](VectorStore::query) | k nearest records, best first |
/// | [`scan`](VectorStore::scan) | Unordered bulk read for diagnostics and fuzzy fallback |
/// | [`count`](VectorStore::count) | Approximate cardinality |
///
/// Every method except `ensure_collection` and `drop_collection` fails with
/// `CollectionNotFound` for an unknown collection.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create `name` if absent. Idempotent.
    async fn ensure_collection(&self, name: &str) -> RagResult<()>;

    /// Remove `name` and every record in it. Returns whether it existed.
    async fn drop_collection(&self, name: &str) -> RagResult<bool>;

    /// Insert or replace records by id.
    async fn upsert(&self, collection: &str, records: &[EmbeddingRecord]) -> RagResult<()>;

    /// Up to `k` records nearest to `vector` by cosine distance, best first.
    async fn query(&self, collection: &str, vector: &[f32], k: usize)
        -> RagResult<Vec<QueryMatch>>;

    /// Up to `limit` records in no particular order.
    async fn scan(&self, collection: &str, limit: usize) -> RagResult<Vec<StoredText>>;

    /// Number of records in the collection.
    async fn count(&self, collection: &str) -> RagResult<u64>;
}

/// Sort hits best-first (ascending distance) and keep the top `k`.
pub fn rank_matches(mut matches: Vec<QueryMatch>, k: usize) -> Vec<QueryMatch> {
    matches.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches.truncate(k);
    matches
}
