//! In-memory [`VectorStore`] implementation for testing and embedding.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Queries are brute-force cosine distance over every record in the
//! collection.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::error::{RagError, RagResult};
use crate::models::{EmbeddingRecord, QueryMatch, StoredText};

use super::{rank_matches, VectorStore};

#[derive(Default)]
struct Collection {
    dims: Option<usize>,
    records: Vec<EmbeddingRecord>,
    index: HashMap<String, usize>,
}

/// In-memory vector store.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all collections, sorted.
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .collections
            .read()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

fn not_found(name: &str) -> RagError {
    RagError::CollectionNotFound(name.to_string())
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_collection(&self, name: &str) -> RagResult<()> {
        let mut collections = self.collections.write().map_err(RagError::store)?;
        collections.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> RagResult<bool> {
        let mut collections = self.collections.write().map_err(RagError::store)?;
        Ok(collections.remove(name).is_some())
    }

    async fn upsert(&self, collection: &str, records: &[EmbeddingRecord]) -> RagResult<()> {
        let mut collections = self.collections.write().map_err(RagError::store)?;
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| not_found(collection))?;

        // Validate the whole batch before writing so an upsert is atomic.
        let mut dims = coll.dims;
        for record in records {
            match dims {
                Some(expected) if expected != record.vector.len() => {
                    return Err(RagError::DimensionMismatch {
                        expected,
                        actual: record.vector.len(),
                    });
                }
                Some(_) => {}
                None => dims = Some(record.vector.len()),
            }
        }
        coll.dims = dims;

        for record in records {
            match coll.index.get(&record.id) {
                Some(&pos) => coll.records[pos] = record.clone(),
                None => {
                    coll.index.insert(record.id.clone(), coll.records.len());
                    coll.records.push(record.clone());
                }
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> RagResult<Vec<QueryMatch>> {
        let collections = self.collections.read().map_err(RagError::store)?;
        let coll = collections.get(collection).ok_or_else(|| not_found(collection))?;

        let matches = coll
            .records
            .iter()
            .map(|r| QueryMatch {
                id: r.id.clone(),
                text: r.text.clone(),
                metadata: r.metadata.clone(),
                distance: cosine_distance(vector, &r.vector),
            })
            .collect();
        Ok(rank_matches(matches, k))
    }

    async fn scan(&self, collection: &str, limit: usize) -> RagResult<Vec<StoredText>> {
        let collections = self.collections.read().map_err(RagError::store)?;
        let coll = collections.get(collection).ok_or_else(|| not_found(collection))?;
        Ok(coll
            .records
            .iter()
            .take(limit)
            .map(|r| StoredText {
                id: r.id.clone(),
                text: r.text.clone(),
                metadata: r.metadata.clone(),
            })
            .collect())
    }

    async fn count(&self, collection: &str) -> RagResult<u64> {
        let collections = self.collections.read().map_err(RagError::store)?;
        let coll = collections.get(collection).ok_or_else(|| not_found(collection))?;
        Ok(coll.records.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;

    fn record(id: &str, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            id: id.to_string(),
            vector,
            text: format!("text {}", id),
            metadata: Metadata::new(),
        }
    }

    #[tokio::test]
    async fn ensure_is_idempotent() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("c").await.unwrap();
        store.upsert("c", &[record("a", vec![1.0, 0.0])]).await.unwrap();
        store.ensure_collection("c").await.unwrap();
        assert_eq!(store.count("c").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn query_orders_best_first() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("c").await.unwrap();
        store
            .upsert(
                "c",
                &[
                    record("far", vec![0.0, 1.0]),
                    record("near", vec![1.0, 0.1]),
                    record("mid", vec![1.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store.query("c", &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "near");
        assert_eq!(hits[1].id, "mid");
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("c").await.unwrap();
        store.upsert("c", &[record("a", vec![1.0, 0.0])]).await.unwrap();
        let mut replacement = record("a", vec![0.0, 1.0]);
        replacement.text = "updated".into();
        store.upsert("c", &[replacement]).await.unwrap();

        assert_eq!(store.count("c").await.unwrap(), 1);
        let scanned = store.scan("c", 10).await.unwrap();
        assert_eq!(scanned[0].text, "updated");
    }

    #[tokio::test]
    async fn rejects_mixed_dimensions_atomically() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("c").await.unwrap();
        store.upsert("c", &[record("a", vec![1.0, 0.0])]).await.unwrap();

        let err = store
            .upsert("c", &[record("b", vec![1.0, 0.0]), record("c", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert_eq!(store.count("c").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_collection_is_an_error() {
        let store = InMemoryVectorStore::new();
        assert!(matches!(
            store.query("nope", &[1.0], 5).await,
            Err(RagError::CollectionNotFound(_))
        ));
        assert!(matches!(
            store.scan("nope", 5).await,
            Err(RagError::CollectionNotFound(_))
        ));
        assert!(!store.drop_collection("nope").await.unwrap());
    }

    #[tokio::test]
    async fn scan_respects_limit() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("c").await.unwrap();
        let records: Vec<_> = (0..20).map(|i| record(&i.to_string(), vec![1.0])).collect();
        store.upsert("c", &records).await.unwrap();
        assert_eq!(store.scan("c", 7).await.unwrap().len(), 7);
        assert_eq!(store.collection_names(), vec!["c".to_string()]);
    }
}
