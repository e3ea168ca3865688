//! Router configuration for the tile server.
//!
//! This module defines the HTTP routes and applies the cache extension,
//! CORS and tracing layers.
//!
//! # Route Structure
//!
//! ```text
//! /health                                   - Health check
//! /tiles/{identifier}/{z}/{x}/{y}.{ext}     - Tile endpoint
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use raster_tiler::server::{create_router, RouterConfig};
//! use raster_tiler::source::NpyDirectorySource;
//! use raster_tiler::tile::{MemoryCache, TileRenderer};
//!
//! let renderer = TileRenderer::new(NpyDirectorySource::new("/data/tiles"));
//! let config = RouterConfig::new()
//!     .with_cache(Arc::new(MemoryCache::new()))
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(renderer, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{routing::get, Extension, Router};
use http::header::CONTENT_TYPE;
use http::{HeaderName, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    health_handler, tile_handler, AppState, DEFAULT_CACHE_MAX_AGE, X_CACHE, X_SERVER_TIMINGS,
};
use crate::source::TileSource;
use crate::tile::{CacheHandle, TileRenderer};

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    /// Cache attached to every tile request (None = caching disabled)
    pub cache: Option<CacheHandle>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a new router configuration.
    ///
    /// By default:
    /// - Caching is disabled
    /// - CORS allows any origin
    /// - Cache max-age is 1 hour (3600 seconds)
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            cache: None,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            cors_origins: None,
            enable_tracing: true,
        }
    }

    /// Attach a cache to every tile request.
    pub fn with_cache(mut self, cache: CacheHandle) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Render every request without a cache.
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// This function builds the complete Axum router with:
/// - Health check and tile routes
/// - The cache handle as a request extension (when configured)
/// - CORS configuration
/// - Request tracing (optional)
pub fn create_router<S>(renderer: TileRenderer<S>, config: RouterConfig) -> Router
where
    S: TileSource,
{
    let app_state = AppState::with_cache_max_age(renderer, config.cache_max_age);
    let cors = build_cors_layer(&config);

    // Uses {filename} to capture "{y}.{ext}"
    let router = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/tiles/{identifier}/{z}/{x}/{filename}",
            get(tile_handler::<S>),
        )
        .with_state(app_state);

    let router = match config.cache {
        Some(cache) => router.layer(Extension(cache)),
        None => router,
    };
    let router = router.layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .expose_headers([
            HeaderName::from_static(X_CACHE),
            HeaderName::from_static(X_SERVER_TIMINGS),
        ])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
