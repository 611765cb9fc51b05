//! SQLite-backed [`ConfigStore`]: durable data source and vector store rows.
//!
//! Timestamps are stored as RFC 3339 text so they round-trip exactly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use voxrag_core::config_store::ConfigStore;
use voxrag_core::models::{DataSource, VectorStoreRecord};
use voxrag_core::{RagError, RagResult};

pub struct SqliteConfigStore {
    pool: SqlitePool,
}

impl SqliteConfigStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn parse_ts(raw: &str) -> RagResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RagError::Store(format!("bad timestamp '{}': {}", raw, e)))
}

fn get<'r, T>(row: &'r SqliteRow, column: &str) -> RagResult<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).map_err(RagError::store)
}

fn row_to_data_source(row: &SqliteRow) -> RagResult<DataSource> {
    let kind: String = get(row, "kind")?;
    let status: String = get(row, "status")?;
    let credentials_json: String = get(row, "credentials_json")?;
    let last_processed_at: Option<String> = get(row, "last_processed_at")?;
    let created_at: String = get(row, "created_at")?;
    let updated_at: String = get(row, "updated_at")?;
    let document_count: i64 = get(row, "document_count")?;

    Ok(DataSource {
        id: get(row, "id")?,
        name: get(row, "name")?,
        kind: kind.parse()?,
        location: get(row, "location")?,
        credentials: serde_json::from_str(&credentials_json)?,
        status: status.parse()?,
        document_count: document_count.max(0) as u64,
        error_message: get(row, "error_message")?,
        last_processed_at: last_processed_at.as_deref().map(parse_ts).transpose()?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn row_to_vector_store(row: &SqliteRow) -> RagResult<VectorStoreRecord> {
    let status: String = get(row, "status")?;
    let created_at: String = get(row, "created_at")?;
    let updated_at: String = get(row, "updated_at")?;
    let vector_count: i64 = get(row, "vector_count")?;

    Ok(VectorStoreRecord {
        id: get(row, "id")?,
        name: get(row, "name")?,
        data_source_id: get(row, "data_source_id")?,
        collection_name: get(row, "collection_name")?,
        status: status.parse()?,
        vector_count: vector_count.max(0) as u64,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

#[async_trait]
impl ConfigStore for SqliteConfigStore {
    async fn load_data_sources(&self) -> RagResult<Vec<DataSource>> {
        let rows = sqlx::query("SELECT * FROM data_sources ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await
            .map_err(RagError::store)?;
        rows.iter().map(row_to_data_source).collect()
    }

    async fn save_data_source(&self, source: &DataSource) -> RagResult<()> {
        sqlx::query(
            r#"
            INSERT INTO data_sources (id, name, kind, location, credentials_json, status,
                                      document_count, error_message, last_processed_at,
                                      created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                kind = excluded.kind,
                location = excluded.location,
                credentials_json = excluded.credentials_json,
                status = excluded.status,
                document_count = excluded.document_count,
                error_message = excluded.error_message,
                last_processed_at = excluded.last_processed_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&source.id)
        .bind(&source.name)
        .bind(source.kind.as_str())
        .bind(&source.location)
        .bind(serde_json::to_string(&source.credentials)?)
        .bind(source.status.as_str())
        .bind(source.document_count as i64)
        .bind(&source.error_message)
        .bind(source.last_processed_at.map(|t| t.to_rfc3339()))
        .bind(source.created_at.to_rfc3339())
        .bind(source.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(RagError::store)?;
        Ok(())
    }

    async fn delete_data_source(&self, id: &str) -> RagResult<bool> {
        let result = sqlx::query("DELETE FROM data_sources WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(RagError::store)?;
        Ok(result.rows_affected() > 0)
    }

    async fn load_vector_stores(&self) -> RagResult<Vec<VectorStoreRecord>> {
        let rows = sqlx::query("SELECT * FROM vector_stores ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await
            .map_err(RagError::store)?;
        rows.iter().map(row_to_vector_store).collect()
    }

    async fn save_vector_store(&self, store: &VectorStoreRecord) -> RagResult<()> {
        sqlx::query(
            r#"
            INSERT INTO vector_stores (id, name, data_source_id, collection_name, status,
                                       vector_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                data_source_id = excluded.data_source_id,
                collection_name = excluded.collection_name,
                status = excluded.status,
                vector_count = excluded.vector_count,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&store.id)
        .bind(&store.name)
        .bind(&store.data_source_id)
        .bind(&store.collection_name)
        .bind(store.status.as_str())
        .bind(store.vector_count as i64)
        .bind(store.created_at.to_rfc3339())
        .bind(store.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(RagError::store)?;
        Ok(())
    }

    async fn delete_vector_store(&self, id: &str) -> RagResult<bool> {
        let result = sqlx::query("DELETE FROM vector_stores WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(RagError::store)?;
        Ok(result.rows_affected() > 0)
    }
}
