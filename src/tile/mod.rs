//! Tile layer.
//!
//! This module holds the in-memory tile representation, the rendered-tile
//! cache and the renderer that ties the pipeline together.
//!
//! # Architecture
//!
//! The renderer sits between the HTTP layer and the tile source:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │  TileRequest + Option<CacheHandle>
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              TileRenderer               │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │ CacheBackend │  │ postprocess →   │  │
//! │  │ (encoded     │  │   reformat      │  │
//! │  │  images)     │  │                 │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │               TileSource                │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileData`]: Band-sequential pixel buffer in one of several sample types
//! - [`Mask`]: Per-pixel validity (0 = no data, 255 = valid)
//! - [`TileRenderer`]: Fingerprint, cache, read, post-process, encode
//! - [`CacheBackend`]: Store for encoded tiles; [`MemoryCache`] is the LRU default
//! - [`get_cache`]: Resolves the cache handle attached to a request

mod cache;
mod data;
mod service;

pub use cache::{
    get_cache, CacheBackend, CacheHandle, CacheKey, CachedImage, MemoryCache,
    DEFAULT_CACHE_CAPACITY,
};
pub(crate) use data::with_tile_data;
pub use data::{full_mask, DataType, Mask, Sample, TileData, MASK_VALID};
pub use service::{RenderedTile, TileRenderer, TileRequest, CACHE_NAMESPACE};
