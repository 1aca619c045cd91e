//! Resource service façade
//!
//! Sits between the HTTP handlers and the configured [`ResourceStore`]:
//! validates payloads before any backend call, applies the listing
//! visibility policy, and mirrors writes to the search delegate through a
//! bounded background queue.
//!
//! The `owner` attribute is trusted as given. Deciding who may act as which
//! owner belongs to an authentication layer in front of this service.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::config::AnonymousListing;
use crate::resource::{now, ListFilter, NewResource, Resource, ResourcePatch};
use crate::search::{IndexOp, IndexQueue, SearchConfig, SearchDelegate};
use crate::store::ResourceStore;
use crate::{Error, Result};

pub struct ResourceService {
    store: Arc<dyn ResourceStore>,
    delegate: Arc<SearchDelegate>,
    indexer: Option<IndexQueue>,
    anonymous_listing: AnonymousListing,
}

impl ResourceService {
    /// Service without search delegation, listing everything for anonymous
    /// callers.
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            delegate: Arc::new(SearchDelegate::Disabled),
            indexer: None,
            anonymous_listing: AnonymousListing::default(),
        }
    }

    /// Attach a search delegate. A configured delegate gets a background
    /// index queue sized from `config`; must be called inside a runtime.
    pub fn with_search(mut self, delegate: SearchDelegate, config: &SearchConfig) -> Self {
        let delegate = Arc::new(delegate);
        self.indexer = delegate.is_configured().then(|| {
            IndexQueue::spawn(
                delegate.clone(),
                config.queue_capacity,
                config.max_in_flight,
            )
        });
        self.delegate = delegate;
        self
    }

    pub fn with_anonymous_listing(mut self, policy: AnonymousListing) -> Self {
        self.anonymous_listing = policy;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub fn search_state(&self) -> &'static str {
        self.delegate.state()
    }

    pub async fn create(&self, body: &Value) -> Result<Resource> {
        let new = NewResource::from_json(body)?;
        let created = self.store.create(new.into_resource(now())).await?;
        tracing::debug!(id = %created.id, backend = self.backend_name(), "Created resource");
        self.mirror(IndexOp::Upsert(created.clone()));
        Ok(created)
    }

    pub async fn get(&self, id: &str) -> Result<Resource> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Filtered listing. Free-text queries go to the search delegate first
    /// when one is configured; an empty answer falls back to the store.
    ///
    /// Delegate hits only name candidates. Each one is reloaded from the
    /// store and checked against the owner, tag and visibility scope there,
    /// so a lagging index can never surface a deleted or hidden record.
    pub async fn list(
        &self,
        owner: Option<String>,
        tag: Option<String>,
        query: Option<String>,
    ) -> Result<Vec<Resource>> {
        let mut filter = ListFilter::new(owner, tag, query);
        if self.anonymous_listing == AnonymousListing::PublicOnly {
            filter = filter.restrict_to_public();
        }

        if let Some(query) = filter.query() {
            if self.delegate.is_configured() {
                let scope = filter.without_query();
                let candidates = self.delegate.search(query, filter.owner()).await;
                let mut seen = HashSet::new();
                let mut hits = Vec::with_capacity(candidates.len());
                for candidate in candidates {
                    if !seen.insert(candidate.id.clone()) {
                        continue;
                    }
                    match self.store.get(&candidate.id).await? {
                        Some(stored) if scope.matches(&stored) => hits.push(stored),
                        _ => {
                            metrics::counter!("larder_search_stale_hits_total").increment(1);
                        }
                    }
                }
                if !hits.is_empty() {
                    tracing::debug!(hits = hits.len(), "Listing answered by search delegate");
                    return Ok(hits);
                }
            }
        }

        self.store.list(&filter).await
    }

    pub async fn update(&self, id: &str, body: &Value) -> Result<Resource> {
        let patch = ResourcePatch::from_json(body)?;
        let updated = self
            .store
            .update(id, patch)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        self.mirror(IndexOp::Upsert(updated.clone()));
        Ok(updated)
    }

    /// Delete a record. Returns whether it existed; callers treat both
    /// outcomes as success.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let existed = self.store.delete(id).await?;
        if !existed {
            tracing::debug!(id = %id, "Delete of unknown resource");
        }
        self.mirror(IndexOp::Remove(id.to_string()));
        Ok(existed)
    }

    fn mirror(&self, op: IndexOp) {
        if let Some(indexer) = &self.indexer {
            indexer.submit(op);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InputError;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn service() -> ResourceService {
        ResourceService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let svc = service();
        let created = svc
            .create(&json!({"name": "Water", "tags": ["water"], "owner": "alice"}))
            .await
            .unwrap();
        assert!(created.id.starts_with("res_"));
        assert_eq!(created.tag.as_deref(), Some("water"));
        assert_eq!(created.created_at, created.updated_at);

        let fetched = svc.get(&created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_create_rejects_before_store() {
        let svc = service();
        let err = svc.create(&json!({"tags": ["x"]})).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(InputError::MissingName)));
        assert!(svc.list(None, None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_id() {
        let svc = service();
        svc.create(&json!({"id": "fixed", "name": "a"})).await.unwrap();
        let err = svc
            .create(&json!({"id": "fixed", "name": "b"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateId(id) if id == "fixed"));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let err = service().get("nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_failed_update_leaves_record() {
        let svc = service();
        let created = svc
            .create(&json!({"name": "Water", "public": true}))
            .await
            .unwrap();

        let err = svc
            .update(&created.id, &json!({"name": "Juice", "public": "yes"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(InputError::InvalidPublic)));
        assert_eq!(svc.get(&created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_update_missing() {
        let err = service()
            .update("nope", &json!({"name": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let svc = service();
        let created = svc.create(&json!({"name": "a"})).await.unwrap();
        assert!(svc.remove(&created.id).await.unwrap());
        assert!(!svc.remove(&created.id).await.unwrap());
        assert!(!svc.remove("never-existed").await.unwrap());
    }

    #[tokio::test]
    async fn test_anonymous_listing_policy() {
        let svc = service();
        svc.create(&json!({"name": "open", "public": true}))
            .await
            .unwrap();
        svc.create(&json!({"name": "closed"})).await.unwrap();
        assert_eq!(svc.list(None, None, None).await.unwrap().len(), 2);

        let strict = ResourceService {
            anonymous_listing: AnonymousListing::PublicOnly,
            ..svc
        };
        let visible = strict.list(None, None, None).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name, "open");
    }

    #[tokio::test]
    async fn test_disabled_search_uses_store() {
        let svc = service().with_search(SearchDelegate::Disabled, &SearchConfig::default());
        assert_eq!(svc.search_state(), "disabled");
        svc.create(&json!({"name": "Shared public", "public": true}))
            .await
            .unwrap();
        svc.create(&json!({"name": "Shared private"})).await.unwrap();

        let hits = svc
            .list(None, None, Some("SHARED".into()))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Shared public");
    }
}
