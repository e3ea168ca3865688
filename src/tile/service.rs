//! Tile rendering.
//!
//! The [`TileRenderer`] is the main entry point for tile requests. It
//! orchestrates:
//! - Request fingerprinting
//! - Cache lookups (only when a cache handle is supplied)
//! - Reading pixels from the [`TileSource`]
//! - Post-processing and encoding
//! - Result caching
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         TileRenderer                            │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                      render()                           │    │
//! │  │  1. Fingerprint       4. Post-process                   │    │
//! │  │  2. Check cache       5. Format                         │    │
//! │  │  3. Read              6. Store in cache                 │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │           │                    │                    │           │
//! │           ▼                    ▼                    ▼           │
//! │    ┌─────────────┐      ┌────────────┐    ┌──────────────────┐  │
//! │    │CacheBackend │      │ TileSource │    │ postprocess +    │  │
//! │    │ (optional)  │      │            │    │ reformat         │  │
//! │    └─────────────┘      └────────────┘    └──────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cache failures never fail a request: a failed lookup is a miss and a failed
//! store is dropped. The rendered bytes are the same whether or not a cache is
//! in play.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::cache::{CacheHandle, CacheKey, CachedImage};
use crate::encode::{reformat, Colormap, ImageType};
use crate::error::PipelineError;
use crate::fingerprint::fingerprint;
use crate::postprocess::PostProcessOptions;
use crate::source::{TileCoord, TileSource};
use crate::timer::Timings;

/// Namespace of rendered tiles in the cache.
pub const CACHE_NAMESPACE: &str = "tile";

// =============================================================================
// Tile Request
// =============================================================================

/// Everything that determines the bytes of a rendered tile.
///
/// The request is fingerprinted as a whole, so any field added here becomes
/// part of the cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRequest {
    #[serde(flatten)]
    pub tile: TileCoord,

    /// Output format
    pub format: ImageType,

    /// Comma-separated `min,max` pairs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rescale: Option<String>,

    /// Color operations, e.g. `gamma rgb 1.5 saturation 1.1`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_formula: Option<String>,

    /// Value to RGBA lookup for single-band tiles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colormap: Option<Colormap>,
}

impl TileRequest {
    /// Create a request with no post-processing.
    pub fn new(tile: TileCoord, format: ImageType) -> Self {
        Self {
            tile,
            format,
            rescale: None,
            color_formula: None,
            colormap: None,
        }
    }

    pub fn with_rescale(mut self, rescale: impl Into<String>) -> Self {
        self.rescale = Some(rescale.into());
        self
    }

    pub fn with_color_formula(mut self, formula: impl Into<String>) -> Self {
        self.color_formula = Some(formula.into());
        self
    }

    pub fn with_colormap(mut self, colormap: Colormap) -> Self {
        self.colormap = Some(colormap);
        self
    }
}

// =============================================================================
// Rendered Tile
// =============================================================================

/// Result of rendering a tile.
#[derive(Debug, Clone)]
pub struct RenderedTile {
    /// Encoded image bytes
    pub content: Bytes,

    /// Format the bytes are encoded in
    pub format: ImageType,

    /// Whether the bytes came from the cache
    pub cache_hit: bool,

    /// Fingerprint of the request
    pub fingerprint: String,

    /// Stage timings. Empty on a cache hit.
    pub timings: Timings,
}

impl RenderedTile {
    pub fn content_type(&self) -> &'static str {
        self.format.media_type()
    }
}

// =============================================================================
// Tile Renderer
// =============================================================================

/// Renders tiles from a source, optionally through a cache.
///
/// # Example
///
/// ```ignore
/// use raster_tiler::source::{NpyDirectorySource, TileCoord};
/// use raster_tiler::tile::{TileRenderer, TileRequest};
/// use raster_tiler::ImageType;
///
/// let renderer = TileRenderer::new(NpyDirectorySource::new("/data/tiles"));
/// let request = TileRequest::new(TileCoord::new("dem", 3, 2, 1), ImageType::Png)
///     .with_rescale("0,1000");
///
/// let tile = renderer.render(&request, None).await?;
/// println!("{} bytes of {}", tile.content.len(), tile.content_type());
/// ```
pub struct TileRenderer<S: TileSource> {
    source: Arc<S>,
}

impl<S: TileSource> Clone for TileRenderer<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<S: TileSource> TileRenderer<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    /// Create a renderer over a shared source.
    pub fn with_shared_source(source: Arc<S>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Render a tile.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The request cannot be fingerprinted
    /// - `rescale` or `color_formula` is malformed or does not fit the tile
    /// - The source cannot supply the tile
    /// - The encoder rejects the processed tile
    ///
    /// Cache errors are logged and never returned.
    pub async fn render(
        &self,
        request: &TileRequest,
        cache: Option<&CacheHandle>,
    ) -> Result<RenderedTile, PipelineError> {
        let fingerprint = fingerprint(request)?;
        let key = CacheKey::new(CACHE_NAMESPACE, fingerprint.as_str());

        if let Some(cache) = cache {
            match cache.get(&key).await {
                Ok(Some(hit)) => {
                    debug!(fingerprint = %fingerprint, format = %hit.format, "tile cache hit");
                    return Ok(RenderedTile {
                        content: hit.content,
                        format: hit.format,
                        cache_hit: true,
                        fingerprint,
                        timings: Timings::new(),
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(fingerprint = %fingerprint, error = %e, "cache lookup failed, rendering");
                }
            }
        }

        // Parameters are checked before any I/O happens
        let options = PostProcessOptions::parse(
            request.rescale.as_deref(),
            request.color_formula.as_deref(),
        )?;

        let mut timings = Timings::new();

        let decoded = {
            let _read = timings.start("Read");
            self.source.read(&request.tile).await?
        };

        let data = timings.time("Post-process", || {
            options.apply(decoded.data, &decoded.mask)
        })?;

        let content = timings.time("Format", || {
            reformat(
                &data,
                &decoded.mask,
                request.format,
                request.colormap.as_ref(),
                decoded.georeference.as_ref(),
            )
        })?;

        debug!(
            fingerprint = %fingerprint,
            format = %request.format,
            bytes = content.len(),
            timings = %timings.server_timing().unwrap_or_default(),
            "rendered tile"
        );

        if let Some(cache) = cache {
            let value = CachedImage::new(content.clone(), request.format);
            if let Err(e) = cache.set(key, value).await {
                warn!(fingerprint = %fingerprint, error = %e, "failed to store tile in cache");
            }
        }

        Ok(RenderedTile {
            content,
            format: request.format,
            cache_hit: false,
            fingerprint,
            timings,
        })
    }
}
