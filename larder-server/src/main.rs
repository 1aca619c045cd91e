use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;

use larder::api::ApiServer;
use larder::config::AnonymousListing;
use larder::search::SearchDelegate;
use larder::store::StoreFactory;
use larder::{Config, ResourceService};

#[derive(Parser, Debug)]
#[command(name = "larder-server")]
#[command(about = "Larder resource storage server")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "LARDER_CONFIG", default_value = "larder.toml")]
    config: String,

    /// Host to bind to (overrides server.bind_addr)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides server.bind_addr and PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load config
    let mut config = Config::load_or_create(Path::new(&args.config))?;
    config.apply_env_overrides()?;
    config.expand_paths()?;
    if let Some(host) = &args.host {
        config.set_host(host);
    }
    if let Some(port) = args.port {
        config.set_port(port);
    }

    larder::telemetry::init_tracing(&config.observability)?;
    tracing::info!("Config file: {}", args.config);

    let metrics = if config.observability.metrics_enabled {
        Some(larder::telemetry::install_metrics()?)
    } else {
        None
    };

    // Create backends
    let store = StoreFactory::create(&config.store).await?;
    let delegate = SearchDelegate::from_config(&config.search)?;
    delegate.prepare().await;

    if config.visibility.anonymous_listing == AnonymousListing::All {
        tracing::warn!(
            "visibility.anonymous_listing = \"all\": listings without owner or query include private resources"
        );
    }

    let search_state = delegate.state();
    let service = ResourceService::new(store)
        .with_search(delegate, &config.search)
        .with_anonymous_listing(config.visibility.anonymous_listing);

    // Create and start server
    let mut server = ApiServer::with_cors(Arc::new(service), config.server.cors.clone());
    if let Some(handle) = metrics {
        server = server.with_metrics(handle);
    }

    tracing::info!(
        store = %config.store.backend,
        search = search_state,
        "Starting Larder server on {}",
        config.server.bind_addr
    );
    server.serve(&config.server.bind_addr).await?;

    Ok(())
}
