//! In-memory [`ConfigStore`] for tests and hosts without a database.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{RagError, RagResult};
use crate::models::{DataSource, VectorStoreRecord};

use super::ConfigStore;

#[derive(Default)]
pub struct InMemoryConfigStore {
    sources: RwLock<BTreeMap<String, DataSource>>,
    stores: RwLock<BTreeMap<String, VectorStoreRecord>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn load_data_sources(&self) -> RagResult<Vec<DataSource>> {
        let sources = self.sources.read().map_err(RagError::store)?;
        Ok(sources.values().cloned().collect())
    }

    async fn save_data_source(&self, source: &DataSource) -> RagResult<()> {
        let mut sources = self.sources.write().map_err(RagError::store)?;
        sources.insert(source.id.clone(), source.clone());
        Ok(())
    }

    async fn delete_data_source(&self, id: &str) -> RagResult<bool> {
        let mut sources = self.sources.write().map_err(RagError::store)?;
        Ok(sources.remove(id).is_some())
    }

    async fn load_vector_stores(&self) -> RagResult<Vec<VectorStoreRecord>> {
        let stores = self.stores.read().map_err(RagError::store)?;
        Ok(stores.values().cloned().collect())
    }

    async fn save_vector_store(&self, store: &VectorStoreRecord) -> RagResult<()> {
        let mut stores = self.stores.write().map_err(RagError::store)?;
        stores.insert(store.id.clone(), store.clone());
        Ok(())
    }

    async fn delete_vector_store(&self, id: &str) -> RagResult<bool> {
        let mut stores = self.stores.write().map_err(RagError::store)?;
        Ok(stores.remove(id).is_some())
    }
}
