//! # raster-tiler
//!
//! The core of a map tile server: rescale, color-correct and encode raster
//! tiles, with content-addressed caching of the encoded result.
//!
//! ## Features
//!
//! - **Post-processing**: Linear rescaling per band and chained color
//!   operations (gamma, sigmoidal contrast, saturation)
//! - **Output formats**: PNG, JPEG, WEBP, GeoTIFF and raw NPY dumps
//! - **Georeferencing**: Affine transform and CRS written as GeoTIFF tags
//! - **Caching**: Encoded tiles keyed by a fingerprint of the request
//! - **Stage timings**: Per-request `Read`/`Post-process`/`Format` durations
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`source`] - Tile sources (local directory of NPY dumps)
//! - [`postprocess`] - Rescaling and color formulas
//! - [`encode`] - Format registry and encoders
//! - [`fingerprint`] - Canonical request hashing
//! - [`timer`] - Stage timing
//! - [`tile`] - Tile representation, cache and renderer
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use raster_tiler::{full_mask, postprocess, reformat, ImageType, TileData};
//! use ndarray::Array3;
//!
//! let tile = TileData::from(Array3::<u16>::zeros((3, 256, 256)));
//! let mask = full_mask(256, 256);
//!
//! let tile = postprocess(tile, &mask, Some("0,4000"), Some("gamma rgb 1.2")).unwrap();
//! let png = reformat(&tile, &mask, ImageType::Png, None, None).unwrap();
//! assert!(!png.is_empty());
//! ```

pub mod config;
pub mod encode;
pub mod error;
pub mod fingerprint;
pub mod postprocess;
pub mod server;
pub mod source;
pub mod tile;
pub mod timer;

// Re-export commonly used types
pub use config::Config;
pub use encode::{
    reformat, reformat_with, Affine, Colormap, Crs, EncodeOptions, FormatProfile, Georeference,
    ImageType,
};
pub use error::{CacheError, NpyError, PipelineError, SourceError};
pub use fingerprint::fingerprint;
pub use postprocess::{postprocess, ColorFormula, PostProcessOptions, RescaleSpec};
pub use server::{create_router, AppState, ErrorResponse, OptionalCache, RouterConfig};
pub use source::{DecodedTile, NpyDirectorySource, TileCoord, TileSource};
pub use tile::{
    full_mask, get_cache, CacheBackend, CacheHandle, CacheKey, CachedImage, DataType, Mask,
    MemoryCache, RenderedTile, TileData, TileRenderer, TileRequest,
};
pub use timer::{Timer, Timings};
