//! HTTP request handlers for the tile API.
//!
//! This module contains the Axum handlers for serving tiles and health checks.
//!
//! # Endpoints
//!
//! - `GET /tiles/{identifier}/{z}/{x}/{y}.{ext}` - Serve a tile
//! - `GET /health` - Health check endpoint

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderName, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::encode::{Colormap, ImageType};
use crate::error::{PipelineError, SourceError};
use crate::source::{TileCoord, TileSource};
use crate::tile::{TileRenderer, TileRequest};

use super::extract::OptionalCache;

/// Response header reporting whether the tile came from the cache.
pub const X_CACHE: &str = "x-cache";

/// Response header carrying per-stage timings of a rendered tile.
pub const X_SERVER_TIMINGS: &str = "x-server-timings";

/// Default Cache-Control max-age in seconds.
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the tile renderer.
///
/// This is passed to all handlers via Axum's State extractor. The cache is
/// not part of the state: it travels with each request as an extension.
pub struct AppState<S: TileSource> {
    pub renderer: TileRenderer<S>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,
}

impl<S: TileSource> AppState<S> {
    pub fn new(renderer: TileRenderer<S>) -> Self {
        Self {
            renderer,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
        }
    }

    pub fn with_cache_max_age(renderer: TileRenderer<S>, cache_max_age: u32) -> Self {
        Self {
            renderer,
            cache_max_age,
        }
    }
}

impl<S: TileSource> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            renderer: self.renderer.clone(),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Path parameters for tile requests.
///
/// Extracted from: `/tiles/{identifier}/{z}/{x}/{filename}`
/// where filename is `{y}.{ext}`
#[derive(Debug, Deserialize)]
pub struct TilePathParams {
    /// Dataset identifier
    pub identifier: String,

    /// Zoom level
    pub z: u8,

    /// Tile column
    pub x: u32,

    /// Tile row and output format, e.g. "12.png"
    pub filename: String,
}

impl TilePathParams {
    /// Split the filename into the tile row and the output format.
    pub fn y_and_format(&self) -> Result<(u32, ImageType), HandlerError> {
        let (y, ext) = self.filename.rsplit_once('.').ok_or_else(|| {
            HandlerError::InvalidPath(format!("missing format extension in '{}'", self.filename))
        })?;
        let y = y
            .parse()
            .map_err(|_| HandlerError::InvalidPath(format!("invalid tile row '{y}'")))?;
        Ok((y, ext.parse()?))
    }
}

/// Query parameters for tile requests.
#[derive(Debug, Default, Deserialize)]
pub struct TileQueryParams {
    /// Comma-separated `min,max` pairs
    pub rescale: Option<String>,

    /// Color operations applied after rescaling
    pub color_formula: Option<String>,

    /// JSON object mapping pixel values to `[r, g, b, a]`
    pub colormap: Option<String>,
}

impl TileQueryParams {
    /// Parse the `colormap` parameter. Blank counts as absent.
    pub fn colormap(&self) -> Result<Option<Colormap>, HandlerError> {
        match self.colormap.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => serde_json::from_str(raw)
                .map(Some)
                .map_err(|e| HandlerError::InvalidColormap(e.to_string())),
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_color_formula")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Status and error type identifier of a pipeline error.
fn classify(err: &PipelineError) -> (StatusCode, &'static str) {
    match err {
        PipelineError::InvalidRescaleSpec(_) => (StatusCode::BAD_REQUEST, "invalid_rescale"),
        PipelineError::InvalidRescaleRange { .. } => {
            (StatusCode::BAD_REQUEST, "invalid_rescale_range")
        }
        PipelineError::InvalidColorFormula(_) => {
            (StatusCode::BAD_REQUEST, "invalid_color_formula")
        }
        PipelineError::UnsupportedFormat(_) => (StatusCode::BAD_REQUEST, "unsupported_format"),
        PipelineError::SerializationError(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
        PipelineError::Source(SourceError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
        PipelineError::Source(SourceError::Io(_)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "io_error")
        }
        PipelineError::Source(SourceError::Decode(_)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "decode_error")
        }
        PipelineError::InvalidTile(_) => (StatusCode::INTERNAL_SERVER_ERROR, "invalid_tile"),
        PipelineError::EncodingError { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "encoding_error")
        }
    }
}

/// Log an error by severity and turn it into a JSON response.
///
/// - 5xx errors are logged at ERROR level
/// - 404s at DEBUG level (common and expected)
/// - other 4xx errors at WARN level
fn error_response(status: StatusCode, error_type: &'static str, message: String) -> Response {
    if status.is_server_error() {
        error!(
            error_type = error_type,
            status = status.as_u16(),
            "Server error: {}",
            message
        );
    } else if status == StatusCode::NOT_FOUND {
        debug!(
            error_type = error_type,
            status = status.as_u16(),
            "Resource not found: {}",
            message
        );
    } else if status.is_client_error() {
        warn!(
            error_type = error_type,
            status = status.as_u16(),
            "Client error: {}",
            message
        );
    }

    let body = ErrorResponse::with_status(error_type, message, status);
    (status, Json(body)).into_response()
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let (status, error_type) = classify(&self);
        error_response(status, error_type, self.to_string())
    }
}

/// Errors a handler can return.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The tile path could not be parsed
    #[error("Invalid tile path: {0}")]
    InvalidPath(String),

    /// The `colormap` parameter is not a valid lookup table
    #[error("Invalid colormap: {0}")]
    InvalidColormap(String),
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        match self {
            HandlerError::Pipeline(err) => err.into_response(),
            HandlerError::InvalidPath(_) => {
                error_response(StatusCode::BAD_REQUEST, "invalid_path", self.to_string())
            }
            HandlerError::InvalidColormap(_) => {
                error_response(StatusCode::BAD_REQUEST, "invalid_colormap", self.to_string())
            }
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle tile requests.
///
/// # Endpoint
///
/// `GET /tiles/{identifier}/{z}/{x}/{y}.{ext}`
///
/// `ext` is one of `png`, `pngraw`, `jpg`/`jpeg`, `webp`, `tif`, `npy`.
///
/// # Query Parameters
///
/// - `rescale`: `min,max[,min,max...]`
/// - `color_formula`: e.g. `gamma rgb 1.5 sigmoidal rgb 7 0.4`
/// - `colormap`: JSON object, e.g. `{"1": [255, 0, 0, 255]}`
///
/// # Response
///
/// - `200 OK`: encoded tile
/// - `400 Bad Request`: invalid path or parameters
/// - `404 Not Found`: no tile at this address
/// - `500 Internal Server Error`: read or encoding failure
///
/// # Headers
///
/// - `Content-Type`: media type of the format
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Cache: HIT|MISS` when caching is enabled
/// - `X-Server-Timings` when the tile was rendered
pub async fn tile_handler<S: TileSource>(
    State(state): State<AppState<S>>,
    cache: OptionalCache,
    Path(params): Path<TilePathParams>,
    Query(query): Query<TileQueryParams>,
) -> Result<Response, HandlerError> {
    let (y, format) = params.y_and_format()?;
    let colormap = query.colormap()?;

    let request = TileRequest {
        tile: TileCoord::new(params.identifier, params.z, params.x, y),
        format,
        rescale: non_blank(query.rescale),
        color_formula: non_blank(query.color_formula),
        colormap,
    };

    let tile = state.renderer.render(&request, cache.handle()).await?;

    let mut headers = vec![
        (header::CONTENT_TYPE, tile.content_type().to_string()),
        (
            header::CACHE_CONTROL,
            format!("public, max-age={}", state.cache_max_age),
        ),
    ];
    if cache.is_enabled() {
        let status = if tile.cache_hit { "HIT" } else { "MISS" };
        headers.push((HeaderName::from_static(X_CACHE), status.to_string()));
    }
    if let Some(timings) = tile.timings.server_timing() {
        headers.push((HeaderName::from_static(X_SERVER_TIMINGS), timings));
    }

    Ok((StatusCode::OK, AppendHeaders(headers), tile.content).into_response())
}

/// Blank parameters are dropped so they fingerprint like absent ones.
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn path(filename: &str) -> TilePathParams {
        TilePathParams {
            identifier: "dem".to_string(),
            z: 3,
            x: 2,
            filename: filename.to_string(),
        }
    }

    #[test]
    fn test_error_response_serialization() {
        let response = ErrorResponse::new("test_error", "Test message");
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test_error"));
        assert!(json.contains("Test message"));
        assert!(!json.contains("status"));
    }

    #[test]
    fn test_error_response_with_status() {
        let response =
            ErrorResponse::with_status("not_found", "Tile not found", StatusCode::NOT_FOUND);
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("404"));
    }

    #[test]
    fn test_filename_parsing() {
        assert_eq!(path("12.png").y_and_format().unwrap(), (12, ImageType::Png));
        assert_eq!(path("0.jpeg").y_and_format().unwrap(), (0, ImageType::Jpeg));
        assert_eq!(path("7.tif").y_and_format().unwrap(), (7, ImageType::Tif));

        assert!(matches!(
            path("12").y_and_format(),
            Err(HandlerError::InvalidPath(_))
        ));
        assert!(matches!(
            path("abc.png").y_and_format(),
            Err(HandlerError::InvalidPath(_))
        ));
        assert!(matches!(
            path("1.gif").y_and_format(),
            Err(HandlerError::Pipeline(PipelineError::UnsupportedFormat(_)))
        ));
    }

    #[test]
    fn test_colormap_parameter() {
        let query = TileQueryParams {
            colormap: Some(r#"{"1": [255, 0, 0, 255], "2": [0, 0, 255, 128]}"#.to_string()),
            ..Default::default()
        };
        let cmap = query.colormap().unwrap().unwrap();
        assert_eq!(cmap[&1], [255, 0, 0, 255]);
        assert_eq!(cmap[&2], [0, 0, 255, 128]);

        let blank = TileQueryParams {
            colormap: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(blank.colormap().unwrap().is_none());

        let bad = TileQueryParams {
            colormap: Some(r#"{"1": [255, 0]}"#.to_string()),
            ..Default::default()
        };
        assert!(matches!(bad.colormap(), Err(HandlerError::InvalidColormap(_))));
    }

    #[test]
    fn test_pipeline_error_to_status_code() {
        let cases = [
            (
                PipelineError::InvalidRescaleSpec("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                PipelineError::InvalidRescaleRange { band: 1, value: 3.0 },
                StatusCode::BAD_REQUEST,
            ),
            (
                PipelineError::InvalidColorFormula("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                PipelineError::UnsupportedFormat("gif".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                PipelineError::Source(SourceError::NotFound("dem/0/0/0".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                PipelineError::Source(SourceError::Io("disk".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                PipelineError::encoding("PNG", "boom"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                PipelineError::InvalidTile("shape".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_handler_error_status_codes() {
        let response = HandlerError::InvalidPath("x".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = HandlerError::InvalidColormap("x".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
