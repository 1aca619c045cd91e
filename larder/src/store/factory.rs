//! Factory for selecting a storage backend at startup.

use std::sync::Arc;

use super::{MemoryStore, RelationalStore, ResourceStore, StoreConfig, StoreKind};
use crate::config::expand_tilde;
use crate::{Error, Result};

/// Builds the one store instance a process runs with.
pub struct StoreFactory;

impl StoreFactory {
    /// Create the configured backend. Connection failures surface here, so a
    /// misconfigured server fails at boot instead of on the first request.
    pub async fn create(config: &StoreConfig) -> Result<Arc<dyn ResourceStore>> {
        tracing::info!(backend = %config.backend, "Selecting resource store");
        match config.backend {
            StoreKind::Memory => Ok(Arc::new(MemoryStore::new())),
            StoreKind::Relational => {
                let relational = &config.relational;
                let store = if relational.is_in_memory() {
                    RelationalStore::in_memory()?
                } else {
                    let path = expand_tilde(&relational.path)
                        .map_err(|e| Error::Config(e.to_string()))?;
                    tracing::info!(path = %path.display(), "Opening relational store");
                    RelationalStore::open(path)?
                };
                Ok(Arc::new(store))
            }
            #[cfg(feature = "store-redis")]
            StoreKind::Document => {
                let store =
                    super::DocumentStore::connect(&config.document, config.request_timeout())
                        .await?;
                Ok(Arc::new(store))
            }
            #[cfg(not(feature = "store-redis"))]
            StoreKind::Document => Err(Error::Config(
                "document store requires the 'store-redis' feature".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_memory_store() {
        let store = StoreFactory::create(&StoreConfig::memory()).await.unwrap();
        assert_eq!(store.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_create_relational_store_in_memory() {
        let store = StoreFactory::create(&StoreConfig::relational(":memory:"))
            .await
            .unwrap();
        assert_eq!(store.backend_name(), "relational");
    }

    #[tokio::test]
    async fn test_create_relational_store_on_disk() {
        let temp = TempDir::new().unwrap();
        let config = StoreConfig::relational(temp.path().join("db").join("resources.db"));
        let store = StoreFactory::create(&config).await.unwrap();
        assert_eq!(store.backend_name(), "relational");
        assert!(temp.path().join("db").join("resources.db").exists());
    }
}
