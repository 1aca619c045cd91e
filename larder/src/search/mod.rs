//! Optional full-text search delegate
//!
//! When an Elasticsearch URL is configured, every write is mirrored into an
//! external index and free-text listings are answered from it. The delegate
//! is strictly best-effort: its failures are logged and counted, never
//! returned to callers, and an empty answer means "fall back to the store".

mod elastic;
mod queue;

pub use elastic::ElasticClient;
pub use queue::{IndexOp, IndexQueue};

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::resource::Resource;

/// Failure talking to the search delegate. Never surfaced past the façade.
#[derive(Error, Debug)]
pub enum DelegateError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search backend returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Elasticsearch base URL. Absent means the delegate is disabled.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_index")]
    pub index: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Pending index operations before new ones are dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Concurrent requests the indexing worker may have outstanding
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Maximum hits returned by one search
    #[serde(default = "default_result_size")]
    pub result_size: usize,
}

fn default_index() -> String {
    "resources".to_string()
}

fn default_request_timeout() -> u64 {
    3000
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_in_flight() -> usize {
    8
}

fn default_result_size() -> usize {
    100
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: None,
            index: default_index(),
            request_timeout_ms: default_request_timeout(),
            queue_capacity: default_queue_capacity(),
            max_in_flight: default_max_in_flight(),
            result_size: default_result_size(),
        }
    }
}

impl SearchConfig {
    pub fn with_url(url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// The delegate is fixed at startup; there is no transition between states.
pub enum SearchDelegate {
    Configured(ElasticClient),
    Disabled,
}

impl SearchDelegate {
    pub fn from_config(config: &SearchConfig) -> Result<Self, DelegateError> {
        match config.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => {
                tracing::info!(url = %url, index = %config.index, "Search delegate configured");
                Ok(Self::Configured(ElasticClient::new(url, config)?))
            }
            _ => {
                tracing::info!("Search delegate disabled");
                Ok(Self::Disabled)
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Configured(_))
    }

    pub fn state(&self) -> &'static str {
        match self {
            Self::Configured(_) => "configured",
            Self::Disabled => "disabled",
        }
    }

    /// Best-effort index setup at startup.
    pub async fn prepare(&self) {
        if let Self::Configured(client) = self {
            if let Err(e) = client.ensure_index().await {
                tracing::warn!(error = %e, "search delegate: could not prepare index");
            }
        }
    }

    /// Upsert a record into the index. Failures are swallowed.
    pub async fn index(&self, resource: &Resource) {
        let Self::Configured(client) = self else {
            return;
        };
        match client.index(resource).await {
            Ok(()) => {
                metrics::counter!("larder_search_index_total", "result" => "ok").increment(1);
            }
            Err(e) => {
                metrics::counter!("larder_search_index_total", "result" => "error").increment(1);
                tracing::warn!(id = %resource.id, error = %e, "search delegate: index failed");
            }
        }
    }

    /// Remove a record from the index. Failures are swallowed.
    pub async fn delete(&self, id: &str) {
        let Self::Configured(client) = self else {
            return;
        };
        if let Err(e) = client.delete(id).await {
            tracing::warn!(id = %id, error = %e, "search delegate: delete failed");
        }
    }

    /// Free-text search. Empty when disabled, when the query is blank, or on
    /// any failure; callers treat empty as "use the store instead".
    pub async fn search(&self, query: &str, owner: Option<&str>) -> Vec<Resource> {
        let Self::Configured(client) = self else {
            return Vec::new();
        };
        if query.trim().is_empty() {
            return Vec::new();
        }
        match client.search(query, owner).await {
            Ok(hits) => {
                metrics::counter!("larder_search_queries_total", "result" => "ok").increment(1);
                hits
            }
            Err(e) => {
                metrics::counter!("larder_search_queries_total", "result" => "error")
                    .increment(1);
                tracing::warn!(error = %e, "search delegate: search failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{now, NewResource};

    #[test]
    fn test_missing_url_disables() {
        let delegate = SearchDelegate::from_config(&SearchConfig::default()).unwrap();
        assert!(!delegate.is_configured());
        assert_eq!(delegate.state(), "disabled");

        let blank = SearchConfig::with_url("  ");
        assert!(!SearchDelegate::from_config(&blank).unwrap().is_configured());
    }

    #[test]
    fn test_url_configures() {
        let delegate =
            SearchDelegate::from_config(&SearchConfig::with_url("http://localhost:9200")).unwrap();
        assert!(delegate.is_configured());
        assert_eq!(delegate.state(), "configured");
    }

    #[tokio::test]
    async fn test_disabled_delegate_is_inert() {
        let delegate = SearchDelegate::Disabled;
        let resource = NewResource::named("x").into_resource(now());
        delegate.index(&resource).await;
        delegate.delete(&resource.id).await;
        assert!(delegate.search("x", None).await.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_delegate_returns_empty() {
        let mut config = SearchConfig::with_url("http://127.0.0.1:1");
        config.request_timeout_ms = 200;
        let delegate = SearchDelegate::from_config(&config).unwrap();

        let resource = NewResource::named("x").into_resource(now());
        delegate.index(&resource).await;
        assert!(delegate.search("x", Some("alice")).await.is_empty());
    }
}
