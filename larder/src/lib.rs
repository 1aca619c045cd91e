pub mod api;
pub mod config;
pub mod error;
pub mod resource;
pub mod search;
pub mod service;
pub mod store;
pub mod telemetry;

pub use config::Config;
pub use error::{Error, Result};
pub use service::ResourceService;
