//! SQLite-backed [`VectorStore`] implementation.
//!
//! Collections are rows in `collections`; records live in
//! `embedding_records` with vectors as little-endian f32 BLOBs. Queries are
//! brute-force: every vector in the collection is decoded and scored by
//! cosine distance, which is fine for the single-collection corpus sizes
//! this engine targets.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use voxrag_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use voxrag_core::models::{EmbeddingRecord, Metadata, QueryMatch, StoredText};
use voxrag_core::store::{rank_matches, VectorStore};
use voxrag_core::{RagError, RagResult};

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// `Some(dims)` for an existing collection (`dims` unset until the first upsert).
    async fn collection_dims(&self, name: &str) -> RagResult<Option<Option<i64>>> {
        sqlx::query_scalar::<_, Option<i64>>("SELECT dims FROM collections WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(RagError::store)
    }

    async fn require_collection(&self, name: &str) -> RagResult<()> {
        match self.collection_dims(name).await? {
            Some(_) => Ok(()),
            None => Err(RagError::CollectionNotFound(name.to_string())),
        }
    }
}

fn parse_metadata(json: &str) -> Metadata {
    serde_json::from_str(json).unwrap_or_default()
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn ensure_collection(&self, name: &str) -> RagResult<()> {
        sqlx::query("INSERT INTO collections (name, dims) VALUES (?, NULL) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(RagError::store)?;
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> RagResult<bool> {
        let mut tx = self.pool.begin().await.map_err(RagError::store)?;
        sqlx::query("DELETE FROM embedding_records WHERE collection = ?")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(RagError::store)?;
        let removed = sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(RagError::store)?
            .rows_affected();
        tx.commit().await.map_err(RagError::store)?;
        Ok(removed > 0)
    }

    async fn upsert(&self, collection: &str, records: &[EmbeddingRecord]) -> RagResult<()> {
        let mut tx = self.pool.begin().await.map_err(RagError::store)?;

        let dims: Option<Option<i64>> =
            sqlx::query_scalar("SELECT dims FROM collections WHERE name = ?")
                .bind(collection)
                .fetch_optional(&mut *tx)
                .await
                .map_err(RagError::store)?;
        let mut dims = match dims {
            Some(d) => d.map(|d| d as usize),
            None => return Err(RagError::CollectionNotFound(collection.to_string())),
        };

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
        if let Some(d) = dims {
            sqlx::query("UPDATE collections SET dims = ? WHERE name = ? AND dims IS NULL")
                .bind(d as i64)
                .bind(collection)
                .execute(&mut *tx)
                .await
                .map_err(RagError::store)?;
        }

        let next_seq: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(seq), -1) + 1 FROM embedding_records WHERE collection = ?",
        )
        .bind(collection)
        .fetch_one(&mut *tx)
        .await
        .map_err(RagError::store)?;

        for (offset, record) in records.iter().enumerate() {
            let metadata_json = serde_json::to_string(&record.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO embedding_records (collection, id, seq, text, metadata_json, vector)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    text = excluded.text,
                    metadata_json = excluded.metadata_json,
                    vector = excluded.vector
                "#,
            )
            .bind(collection)
            .bind(&record.id)
            .bind(next_seq + offset as i64)
            .bind(&record.text)
            .bind(&metadata_json)
            .bind(vec_to_blob(&record.vector))
            .execute(&mut *tx)
            .await
            .map_err(RagError::store)?;
        }

        tx.commit().await.map_err(RagError::store)?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> RagResult<Vec<QueryMatch>> {
        self.require_collection(collection).await?;

        let rows = sqlx::query(
            "SELECT id, text, metadata_json, vector FROM embedding_records WHERE collection = ?",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::store)?;

        let mut matches = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.try_get("vector").map_err(RagError::store)?;
            let metadata_json: String = row.try_get("metadata_json").map_err(RagError::store)?;
            matches.push(QueryMatch {
                id: row.try_get("id").map_err(RagError::store)?,
                text: row.try_get("text").map_err(RagError::store)?,
                metadata: parse_metadata(&metadata_json),
                distance: cosine_distance(vector, &blob_to_vec(&blob)),
            });
        }
        Ok(rank_matches(matches, k))
    }

    async fn scan(&self, collection: &str, limit: usize) -> RagResult<Vec<StoredText>> {
        self.require_collection(collection).await?;

        let rows = sqlx::query(
            "SELECT id, text, metadata_json FROM embedding_records WHERE collection = ? ORDER BY seq LIMIT ?",
        )
        .bind(collection)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::store)?;

        rows.iter()
            .map(|row| {
                let metadata_json: String =
                    row.try_get("metadata_json").map_err(RagError::store)?;
                Ok(StoredText {
                    id: row.try_get("id").map_err(RagError::store)?,
                    text: row.try_get("text").map_err(RagError::store)?,
                    metadata: parse_metadata(&metadata_json),
                })
            })
            .collect()
    }

    async fn count(&self, collection: &str) -> RagResult<u64> {
        self.require_collection(collection).await?;
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM embedding_records WHERE collection = ?")
                .bind(collection)
                .fetch_one(&self.pool)
                .await
                .map_err(RagError::store)?;
        Ok(count as u64)
    }
}
