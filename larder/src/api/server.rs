//! HTTP server: shared state, router assembly, CORS and serving

use crate::config::CorsConfig;
use crate::service::ResourceService;
use crate::Result;
use axum::{
    http::{HeaderValue, Method},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::routes;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ResourceService>,
    pub metrics: Option<PrometheusHandle>,
}

pub struct ApiServer {
    service: Arc<ResourceService>,
    metrics: Option<PrometheusHandle>,
    cors_config: CorsConfig,
}

impl ApiServer {
    pub fn new(service: Arc<ResourceService>) -> Self {
        Self::with_cors(service, CorsConfig::default())
    }

    pub fn with_cors(service: Arc<ResourceService>, cors_config: CorsConfig) -> Self {
        Self {
            service,
            metrics: None,
            cors_config,
        }
    }

    /// Expose the given recorder at GET /metrics
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build CORS layer from configuration
    fn build_cors_layer(&self) -> CorsLayer {
        if !self.cors_config.enabled {
            return CorsLayer::new();
        }

        let origins: Vec<HeaderValue> = self
            .cors_config
            .origins
            .iter()
            .filter(|o| o.as_str() != "*")
            .filter_map(|o| o.parse().ok())
            .collect();

        let has_wildcard = self.cors_config.origins.iter().any(|o| o == "*");

        let cors = if has_wildcard {
            CorsLayer::new().allow_origin(tower_http::cors::Any)
        } else if origins.is_empty() {
            CorsLayer::new()
        } else {
            CorsLayer::new().allow_origin(origins)
        };

        cors.allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(tower_http::cors::Any)
    }

    pub fn router(&self) -> Router {
        let state = AppState {
            service: self.service.clone(),
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route(
                "/resources",
                get(routes::list_resources).post(routes::create_resource),
            )
            .route(
                "/resources/:id",
                get(routes::get_resource)
                    .put(routes::update_resource)
                    .delete(routes::delete_resource),
            )
            .route("/health", get(routes::health))
            .route("/metrics", get(routes::metrics))
            .with_state(state)
            .layer(self.build_cors_layer())
            .layer(TraceLayer::new_for_http())
    }

    pub async fn serve(self, addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}
