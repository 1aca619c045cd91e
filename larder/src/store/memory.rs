//! In-memory resource store

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{record_op, ResourceStore};
use crate::resource::{now, sort_for_listing, ListFilter, Resource, ResourcePatch};
use crate::{Error, Result};

/// Process-local store backed by a map.
///
/// Each instance owns its map, so tests build independent stores instead of
/// sharing one global.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Resource>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn create(&self, resource: Resource) -> Result<Resource> {
        record_op("memory", "create");
        let mut records = self.records.write();
        // Check and insert under one write lock
        if records.contains_key(&resource.id) {
            return Err(Error::DuplicateId(resource.id));
        }
        records.insert(resource.id.clone(), resource.clone());
        Ok(resource)
    }

    async fn get(&self, id: &str) -> Result<Option<Resource>> {
        record_op("memory", "get");
        Ok(self.records.read().get(id).cloned())
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<Resource>> {
        record_op("memory", "list");
        let mut matched: Vec<Resource> = self
            .records
            .read()
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        sort_for_listing(&mut matched);
        Ok(matched)
    }

    async fn update(&self, id: &str, patch: ResourcePatch) -> Result<Option<Resource>> {
        record_op("memory", "update");
        let mut records = self.records.write();
        match records.get_mut(id) {
            Some(existing) => {
                existing.apply(patch, now());
                Ok(Some(existing.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        record_op("memory", "delete");
        Ok(self.records.write().remove(id).is_some())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
