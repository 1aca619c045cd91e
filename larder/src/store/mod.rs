//! Resource storage backends
//!
//! Every engine implements [`ResourceStore`] with the same observable
//! behaviour; callers only see `Arc<dyn ResourceStore>` handed out by
//! [`StoreFactory`].
//!
//! - [`MemoryStore`]: owned in-process map, full scan on `list`
//! - [`DocumentStore`]: Redis documents with owner index sets (`store-redis`)
//! - [`RelationalStore`]: SQLite table with denormalized filter columns

mod config;
mod factory;
mod memory;
mod relational;

#[cfg(feature = "store-redis")]
mod document;

pub use config::{DocumentConfig, RelationalConfig, StoreConfig};
pub use factory::StoreFactory;
pub use memory::MemoryStore;
pub use relational::RelationalStore;

#[cfg(feature = "store-redis")]
pub use document::DocumentStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::resource::{ListFilter, Resource, ResourcePatch};
use crate::Result;

/// Storage engine selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    #[default]
    Memory,
    Document,
    Relational,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Document => "document",
            Self::Relational => "relational",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = crate::Error;

    /// Accepts the canonical names plus the engine aliases used by older
    /// deployments (`redis`, `dynamo`, `sqlite`, `postgres`).
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" | "in-memory" => Ok(Self::Memory),
            "document" | "redis" | "dynamo" | "dynamodb" => Ok(Self::Document),
            "relational" | "sqlite" | "sql" | "postgres" => Ok(Self::Relational),
            other => Err(crate::Error::Config(format!(
                "unknown store backend '{}'",
                other
            ))),
        }
    }
}

/// Operation contract shared by every storage engine.
///
/// # Consistency
///
/// Only `create` is atomic: a caller-supplied id that already exists fails
/// with [`Error::DuplicateId`](crate::Error::DuplicateId). `update` is a
/// read-modify-write; concurrent updates of one id are last-write-wins.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Persist a new record. Fails with `DuplicateId` if `resource.id` exists.
    async fn create(&self, resource: Resource) -> Result<Resource>;

    /// Fetch one record by id.
    async fn get(&self, id: &str) -> Result<Option<Resource>>;

    /// Records matching `filter`, oldest first.
    async fn list(&self, filter: &ListFilter) -> Result<Vec<Resource>>;

    /// Merge `patch` into an existing record. `Ok(None)` if the id is absent.
    async fn update(&self, id: &str, patch: ResourcePatch) -> Result<Option<Resource>>;

    /// Remove a record. Returns whether it existed; deleting a missing id is
    /// not an error.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Backend name for logs and metrics
    fn backend_name(&self) -> &'static str;
}

pub(crate) fn record_op(backend: &'static str, op: &'static str) {
    metrics::counter!("larder_store_operations_total", "backend" => backend, "op" => op)
        .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_kind_aliases() {
        assert_eq!("memory".parse::<StoreKind>().unwrap(), StoreKind::Memory);
        assert_eq!("Dynamo".parse::<StoreKind>().unwrap(), StoreKind::Document);
        assert_eq!("redis".parse::<StoreKind>().unwrap(), StoreKind::Document);
        assert_eq!(" sqlite ".parse::<StoreKind>().unwrap(), StoreKind::Relational);
        assert!("mongo".parse::<StoreKind>().is_err());
    }

    #[test]
    fn test_store_kind_display() {
        assert_eq!(StoreKind::Relational.to_string(), "relational");
    }
}
