//! Tile encoding ("reformatting").
//!
//! Turns a processed tile and its mask into the bytes of an output format.
//!
//! ```text
//!                  ┌──────────────┐
//!   ImageType ───▶ │   registry   │ ──▶ driver + default EncodeOptions
//!                  └──────┬───────┘
//!                         │  georeference given and format is GTiff?
//!                         │  yes: options = EncodeOptions::georeferenced(..)
//!                         ▼
//!                  ┌──────────────┐
//!   colormap? ───▶ │   colormap   │ ──▶ RGB + alpha (single-band input only)
//!                  └──────┬───────┘
//!                         ▼
//!          ┌────────┬─────┴────┬────────┬────────┐
//!          │  PNG   │   JPEG   │  WEBP  │ GTiff  │     NPY bypasses all of the above
//!          └────────┴──────────┴────────┴────────┘
//! ```
//!
//! Encoding is a pure function of its inputs: identical calls produce
//! identical bytes.

mod colormap;
mod format;
mod geotiff;
mod georef;
mod npy;
mod raster;

pub use colormap::{apply_colormap, Colormap};
pub use format::{Compression, Driver, EncodeOptions, FormatProfile, ImageType};
pub use geotiff::{
    encode_geotiff, TAG_GEO_ASCII_PARAMS, TAG_GEO_KEY_DIRECTORY, TAG_MODEL_PIXEL_SCALE,
    TAG_MODEL_TIEPOINT, TAG_MODEL_TRANSFORMATION,
};
pub use georef::{Affine, Crs, Georeference, WEB_MERCATOR_ORIGIN};
pub use npy::{decode_npy, descr, encode_npy, read_npy_array, NpyDtype, NpyRecord};
pub use raster::{encode_image, DEFAULT_JPEG_QUALITY};

use bytes::Bytes;

use crate::error::PipelineError;
use crate::tile::{Mask, TileData};

/// Resolve the options a format is encoded with.
///
/// A georeference replaces the format defaults, but only for formats that
/// can carry one; everywhere else it is ignored.
pub fn resolve_options(format: ImageType, georeference: Option<&Georeference>) -> EncodeOptions {
    let profile = format.profile();
    match georeference {
        Some(georef) if profile.georeferencing => EncodeOptions::georeferenced(*georef),
        _ => profile.defaults,
    }
}

/// Encode a tile in `format` using the registry's options.
pub fn reformat(
    data: &TileData,
    mask: &Mask,
    format: ImageType,
    colormap: Option<&Colormap>,
    georeference: Option<&Georeference>,
) -> Result<Bytes, PipelineError> {
    let options = resolve_options(format, georeference);
    reformat_with(data, mask, format, colormap, &options)
}

/// Encode a tile in `format` with explicit options.
pub fn reformat_with(
    data: &TileData,
    mask: &Mask,
    format: ImageType,
    colormap: Option<&Colormap>,
    options: &EncodeOptions,
) -> Result<Bytes, PipelineError> {
    data.validate_mask(mask)?;
    let driver = format.driver();

    if driver == Driver::Npy {
        return Ok(Bytes::from(encode_npy(data, mask)));
    }

    let colored;
    let (data, mask) = match colormap {
        Some(cmap) => {
            colored = apply_colormap(data, mask, cmap, driver.name())?;
            (&colored.0, &colored.1)
        }
        None => (data, mask),
    };

    let bytes = match driver {
        Driver::GTiff => encode_geotiff(data, mask, options)?,
        _ => encode_image(driver, data, mask, options)?,
    };
    Ok(Bytes::from(bytes))
}
