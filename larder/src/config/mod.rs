//! Configuration management for larder
//!
//! Default config location: ./larder.toml

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::search::SearchConfig;
use crate::store::{StoreConfig, StoreKind};

/// Main configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub visibility: VisibilityConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub cors: CorsConfig,
}

fn default_bind_addr() -> String {
    "127.0.0.1:4000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cors: CorsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Allowed origins. Use "*" for any origin.
    #[serde(default = "default_cors_origins")]
    pub origins: Vec<String>,
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:5173".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}

fn default_true() -> bool {
    true
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            origins: default_cors_origins(),
        }
    }
}

/// What an owner-less listing may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnonymousListing {
    /// Every record, private ones included, unless a text query is given
    #[default]
    All,
    /// Public records only
    PublicOnly,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct VisibilityConfig {
    #[serde(default)]
    pub anonymous_listing: AnonymousListing,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log output format: "pretty" or "json"
    /// Override with LOG_FORMAT env var
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter string
    /// Override with RUST_LOG env var
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable Prometheus metrics at GET /metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_log_level() -> String {
    "info,larder=debug".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            log_level: default_log_level(),
            metrics_enabled: true,
        }
    }
}

/// Expand ~ to home directory in path
pub fn expand_tilde(path: &Path) -> Result<PathBuf> {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
        Ok(home.join(rest))
    } else if s == "~" {
        dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))
    } else {
        Ok(path.to_path_buf())
    }
}

impl Config {
    /// Load config from file path, or create default
    pub fn load_or_create(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = fs::read_to_string(config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("parsing {}", config_path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            // Try to save default config
            if let Some(parent) = config_path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            let _ = config.save(config_path);
            Ok(config)
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(backend) = get("RESOURCE_STORE") {
            self.store.backend = backend.parse::<StoreKind>()?;
        }
        if let Some(url) = get("REDIS_URL") {
            self.store.document.url = url;
        }
        // Local endpoint override wins over REDIS_URL
        if let Some(endpoint) = get("STORE_ENDPOINT") {
            self.store.document.url = endpoint;
        }
        if let Some(prefix) = get("RESOURCE_PREFIX") {
            self.store.document.prefix = prefix;
        }
        if let Some(path) = get("DATABASE_PATH") {
            self.store.relational.path = PathBuf::from(path);
        }
        if let Some(url) = get("ELASTIC_URL").or_else(|| get("ELASTICSEARCH_URL")) {
            self.search.url = Some(url);
        }
        if let Some(port) = get("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .with_context(|| format!("PORT must be a port number, got '{}'", port))?;
            self.set_port(port);
        }
        if let Some(format) = get("LOG_FORMAT") {
            self.observability.log_format = format;
        }
        Ok(())
    }

    /// Replace the port of `server.bind_addr`, keeping its host.
    pub fn set_port(&mut self, port: u16) {
        let host = self.host().to_string();
        self.server.bind_addr = format!("{}:{}", host, port);
    }

    /// Replace the host of `server.bind_addr`, keeping its port.
    pub fn set_host(&mut self, host: &str) {
        let port = self
            .server
            .bind_addr
            .rsplit_once(':')
            .map(|(_, p)| p.to_string())
            .unwrap_or_else(|| "4000".to_string());
        self.server.bind_addr = format!("{}:{}", host, port);
    }

    fn host(&self) -> &str {
        self.server
            .bind_addr
            .rsplit_once(':')
            .map(|(h, _)| h)
            .unwrap_or(&self.server.bind_addr)
    }

    /// Expand ~ in all paths
    pub fn expand_paths(&mut self) -> Result<()> {
        if !self.store.relational.is_in_memory() {
            self.store.relational.path = expand_tilde(&self.store.relational.path)?;
        }
        Ok(())
    }
}
