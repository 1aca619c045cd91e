//! HTTP surface
//!
//! Thin axum layer over [`ResourceService`](crate::service::ResourceService).
//! No authentication happens here: the `owner` in request bodies and query
//! strings is taken at face value, so deployments that need per-owner
//! isolation must put an authenticating proxy in front.

pub mod error;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use server::{ApiServer, AppState};
