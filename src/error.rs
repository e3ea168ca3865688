use thiserror::Error;

/// Errors reported by the tile post-processing and encoding pipeline.
///
/// Every variant is surfaced to the caller. Cache failures are
/// not part of this enum: they are logged and the pipeline recomputes.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Rescale string could not be parsed into (min, max) pairs
    #[error("Invalid rescale spec: {0}")]
    InvalidRescaleSpec(String),

    /// A band's rescale range has min == max
    #[error("Invalid rescale range for band {band}: min and max are both {value}")]
    InvalidRescaleRange { band: usize, value: f64 },

    /// Formula string is malformed, names an unknown operation, or cannot be
    /// applied to the tile's bands
    #[error("Invalid color formula: {0}")]
    InvalidColorFormula(String),

    /// Format descriptor is not in the registry
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Fingerprint input is not canonicalizable
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The encoder rejected the buffer or its options
    #[error("Encoding error ({driver}): {message}")]
    EncodingError {
        driver: &'static str,
        message: String,
    },

    /// Tile buffer and mask do not describe a valid tile
    #[error("Invalid tile: {0}")]
    InvalidTile(String),

    /// The source decoder failed to supply the tile
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}

impl PipelineError {
    pub(crate) fn encoding(driver: &'static str, message: impl Into<String>) -> Self {
        PipelineError::EncodingError {
            driver,
            message: message.into(),
        }
    }
}

/// Errors from a [`TileSource`](crate::source::TileSource).
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// No tile exists at the requested address
    #[error("Tile not found: {0}")]
    NotFound(String),

    /// Reading the underlying storage failed
    #[error("I/O error: {0}")]
    Io(String),

    /// The stored bytes are not a valid tile
    #[error("Decode error: {0}")]
    Decode(String),
}

impl From<NpyError> for SourceError {
    fn from(err: NpyError) -> Self {
        SourceError::Decode(err.to_string())
    }
}

/// Errors raised while reading a raw numeric dump.
#[derive(Debug, Clone, Error)]
pub enum NpyError {
    #[error("Invalid NPY magic bytes")]
    InvalidMagic,

    #[error("Unsupported NPY version: {0}.x")]
    UnsupportedVersion(u8),

    #[error("Malformed NPY header: {0}")]
    MalformedHeader(String),

    #[error("Unsupported NPY dtype: {0}")]
    UnsupportedDtype(String),

    #[error("Fortran-ordered arrays are not supported")]
    FortranOrder,

    #[error("Truncated NPY data: need {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Unexpected array shape: {0}")]
    Shape(String),
}

/// Cache backend errors. Never escape the renderer.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The backend could not be reached or refused the operation
    #[error("Cache backend error: {0}")]
    Backend(String),
}
