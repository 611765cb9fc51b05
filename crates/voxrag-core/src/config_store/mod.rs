//! Durable configuration store for data source and vector store rows.
//!
//! The service keeps its working set in memory and writes every mutation
//! through a [`ConfigStore`] so the set can be rehydrated after a restart.
//! The store owns no lifecycle logic; it persists whatever row it is given.

pub mod memory;

use async_trait::async_trait;

use crate::error::RagResult;
use crate::models::{DataSource, VectorStoreRecord};

#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Every persisted data source.
    async fn load_data_sources(&self) -> RagResult<Vec<DataSource>>;

    /// Insert or replace a data source row by id.
    async fn save_data_source(&self, source: &DataSource) -> RagResult<()>;

    /// Remove a data source row. Returns whether it existed.
    async fn delete_data_source(&self, id: &str) -> RagResult<bool>;

    /// Every persisted vector store row.
    async fn load_vector_stores(&self) -> RagResult<Vec<VectorStoreRecord>>;

    /// Insert or replace a vector store row by id.
    async fn save_vector_store(&self, store: &VectorStoreRecord) -> RagResult<()>;

    /// Remove a vector store row. Returns whether it existed.
    async fn delete_vector_store(&self, id: &str) -> RagResult<bool>;
}
