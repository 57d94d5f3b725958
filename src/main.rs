//! neuro-streamer - a tile server for brain specimen imaging datasets.
//!
//! This binary loads the specimen metadata registry, wires up the data
//! service and serves the HTTP endpoints.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use neuro_streamer::{
    config::Config,
    meta::MetadataRegistry,
    server::{create_router, RouterConfig},
    tile::{DataService, ResultCache},
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Configuration:");
    info!("  Data root: {}", config.data_root.display());
    match config.cache_capacity {
        Some(capacity) => info!(
            "  Result cache: {}MB, TTL {}s",
            capacity / (1024 * 1024),
            config.cache_ttl
        ),
        None => info!("  Result cache: disabled (pass-through)"),
    }

    // Eager registry load; a missing specimens document is fatal, individual
    // bad entries were already skipped with a warning.
    let registry = match MetadataRegistry::load(&config.data_root) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!(
                "Failed to load specimen metadata from {}: {}",
                config.data_root.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    };

    if registry.snapshot().is_empty() {
        error!("No usable specimen entries in the metadata document");
        return ExitCode::FAILURE;
    }

    let service = match config.cache_capacity {
        Some(capacity) => {
            let cache =
                ResultCache::with_capacity(capacity, Some(Duration::from_secs(config.cache_ttl)));
            DataService::with_cache(Arc::clone(&registry), cache)
        }
        None => DataService::new(Arc::clone(&registry)),
    };

    let router_config = RouterConfig {
        cors_origins: config.cors_origins.clone(),
        cache_max_age: config.cache_max_age,
        enable_tracing: !config.no_tracing,
    };
    let router = create_router(Arc::new(service), router_config);

    let addr = config.bind_address();
    info!("");
    info!("Server listening on http://{}", addr);
    info!("  curl http://{}/health", addr);
    info!("  curl http://{}/metadata?type=specimens", addr);
    info!("  curl http://{}/data/<data_id>", addr);
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "neuro_streamer=debug,tower_http=debug"
    } else {
        "neuro_streamer=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
