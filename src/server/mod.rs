//! HTTP server layer.
//!
//! This module provides the HTTP API for serving rendered tiles.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │         GET /tiles/{identifier}/{z}/{x}/{y}.{ext}               │
//! │                                                                 │
//! │  ┌─────────────┐  ┌──────────────┐  ┌────────────────────────┐  │
//! │  │  handlers   │  │   extract    │  │        routes          │  │
//! │  │ (requests)  │  │(OptionalCache│  │ (router config, cache  │  │
//! │  │             │  │  extractor)  │  │  extension, CORS)      │  │
//! │  └─────────────┘  └──────────────┘  └────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod extract;
pub mod handlers;
pub mod routes;

pub use extract::OptionalCache;
pub use handlers::{
    health_handler, tile_handler, AppState, ErrorResponse, HandlerError, HealthResponse,
    TilePathParams, TileQueryParams, DEFAULT_CACHE_MAX_AGE, X_CACHE, X_SERVER_TIMINGS,
};
pub use routes::{create_router, RouterConfig};
