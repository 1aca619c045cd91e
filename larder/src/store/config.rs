//! Store configuration.
//!
//! # Configuration Examples
//!
//! ## In-memory (Default)
//!
//! ```toml
//! [store]
//! backend = "memory"
//! ```
//!
//! ## Document store (Redis)
//!
//! ```toml
//! [store]
//! backend = "document"
//!
//! [store.document]
//! url = "redis://127.0.0.1:6379"
//! prefix = "larder:"
//! ```
//!
//! ## Relational (SQLite)
//!
//! ```toml
//! [store]
//! backend = "relational"
//!
//! [store.relational]
//! path = "~/.larder/resources.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::StoreKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreKind,

    /// Upper bound on a single network round-trip to the store
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub document: DocumentConfig,

    #[serde(default)]
    pub relational: RelationalConfig,
}

fn default_request_timeout() -> u64 {
    5000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreKind::default(),
            request_timeout_ms: default_request_timeout(),
            document: DocumentConfig::default(),
            relational: RelationalConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self::default()
    }

    pub fn relational(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: StoreKind::Relational,
            relational: RelationalConfig { path: path.into() },
            ..Self::default()
        }
    }

    pub fn document(url: &str) -> Self {
        Self {
            backend: StoreKind::Document,
            document: DocumentConfig {
                url: url.to_string(),
                ..DocumentConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Redis connection URL
    #[serde(default = "default_document_url")]
    pub url: String,

    /// Key prefix, so several deployments can share one Redis
    #[serde(default = "default_document_prefix")]
    pub prefix: String,
}

fn default_document_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_document_prefix() -> String {
    "larder:".to_string()
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            url: default_document_url(),
            prefix: default_document_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationalConfig {
    /// SQLite database file. `:memory:` opens a private in-memory database.
    #[serde(default = "default_relational_path")]
    pub path: PathBuf,
}

fn default_relational_path() -> PathBuf {
    PathBuf::from("./data/resources.db")
}

impl Default for RelationalConfig {
    fn default() -> Self {
        Self {
            path: default_relational_path(),
        }
    }
}

impl RelationalConfig {
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == ":memory:"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_memory() {
        let config = StoreConfig::default();
        assert_eq!(config.backend, StoreKind::Memory);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_parse_relational() {
        let config: StoreConfig = toml::from_str(
            r#"
            backend = "relational"
            [relational]
            path = ":memory:"
            "#,
        )
        .unwrap();
        assert_eq!(config.backend, StoreKind::Relational);
        assert!(config.relational.is_in_memory());
    }

    #[test]
    fn test_parse_document_defaults() {
        let config: StoreConfig = toml::from_str(r#"backend = "document""#).unwrap();
        assert_eq!(config.backend, StoreKind::Document);
        assert_eq!(config.document.prefix, "larder:");
        assert_eq!(config.document.url, "redis://127.0.0.1:6379");
    }
}
