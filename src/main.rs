//! raster-tiler - A map tile server for raster datasets.
//!
//! This binary starts the HTTP server and configures all components.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use raster_tiler::{
    config::Config,
    server::{create_router, RouterConfig},
    source::NpyDirectorySource,
    tile::{MemoryCache, TileRenderer},
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("raster-tiler v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Data directory: {}", config.data_dir.display());
    if config.cache_enabled() {
        info!("  Cache: {}MB in memory", config.cache_capacity / (1024 * 1024));
    } else {
        warn!("  Cache: DISABLED - every request is rendered");
    }
    info!("  Cache-Control max-age: {}s", config.cache_max_age);

    let source = NpyDirectorySource::new(config.data_dir.clone());
    let renderer = TileRenderer::new(source);
    let router = create_router(renderer, build_router_config(&config));

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/tiles/<identifier>/<z>/<x>/<y>.png", addr);
    info!("");
    info!("  Formats: png, pngraw, jpg, webp, tif, npy");
    info!("────────────────────────────────────────────────────────────────");
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
        "raster_tiler=debug,tower_http=debug"
    } else {
        "raster_tiler=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new().with_cache_max_age(config.cache_max_age);

    if config.cache_enabled() {
        router_config =
            router_config.with_cache(Arc::new(MemoryCache::with_capacity(config.cache_capacity)));
    }

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}
