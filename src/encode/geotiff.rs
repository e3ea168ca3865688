//! GTiff driver.
//!
//! Writes a single-strip, pixel-interleaved TIFF through the `tiff` crate's
//! low-level directory encoder, which allows any band count and sample type.
//! When a georeference is given the standard GeoTIFF tags are added:
//!
//! | Tag                  | ID    | Written when              |
//! |----------------------|-------|---------------------------|
//! | ModelPixelScale      | 33550 | transform is north-up     |
//! | ModelTiepoint        | 33922 | transform is north-up     |
//! | ModelTransformation  | 34264 | transform is rotated      |
//! | GeoKeyDirectory      | 34735 | always                    |
//! | GeoAsciiParams       | 34737 | always                    |

use std::io::{Cursor, Write};

use flate2::write::ZlibEncoder;
use ndarray::Array3;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

use super::format::{Compression, EncodeOptions};
use super::georef::Georeference;
use super::raster::interleave;
use crate::error::PipelineError;
use crate::tile::{with_tile_data, DataType, Mask, Sample, TileData};

const DRIVER: &str = "GTiff";

pub const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
pub const TAG_MODEL_TIEPOINT: u16 = 33922;
pub const TAG_MODEL_TRANSFORMATION: u16 = 34264;
pub const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
pub const TAG_GEO_ASCII_PARAMS: u16 = 34737;

const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GT_CITATION_GEO_KEY: u16 = 1026;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

// ExtraSamples values
const EXTRA_UNSPECIFIED: u16 = 0;
const EXTRA_UNASSOCIATED_ALPHA: u16 = 2;

/// Encode `data` as a (Geo)TIFF.
pub fn encode_geotiff(
    data: &TileData,
    mask: &Mask,
    options: &EncodeOptions,
) -> Result<Vec<u8>, PipelineError> {
    let (bands, rows, cols) = data.shape();
    if rows == 0 || cols == 0 {
        return Err(PipelineError::encoding(DRIVER, "tile has zero width or height"));
    }

    let alpha = options.alpha.then_some(mask);
    let samples = bands + usize::from(alpha.is_some());
    let raw = with_tile_data!(data, arr => pixel_bytes(arr, alpha));

    let strip = match options.compression {
        Compression::None => raw,
        Compression::Deflate => deflate(&raw)?,
    };

    let layout = Layout {
        dtype: data.dtype(),
        bands,
        samples,
        has_alpha: alpha.is_some(),
        width: cols as u32,
        height: rows as u32,
    };

    let mut cursor = Cursor::new(Vec::new());
    write_tiff(&mut cursor, &layout, &strip, options)
        .map_err(|e| PipelineError::encoding(DRIVER, e.to_string()))?;
    Ok(cursor.into_inner())
}

struct Layout {
    dtype: DataType,
    bands: usize,
    samples: usize,
    has_alpha: bool,
    width: u32,
    height: u32,
}

impl Layout {
    fn photometric(&self) -> u16 {
        // RGB when the data bands are exactly three, BlackIsZero otherwise
        if self.bands == 3 {
            2
        } else {
            1
        }
    }

    fn extra_samples(&self) -> Vec<u16> {
        let color = if self.bands == 3 { 3 } else { 1 };
        let mut extra = vec![EXTRA_UNSPECIFIED; self.samples - color];
        if self.has_alpha {
            if let Some(last) = extra.last_mut() {
                *last = EXTRA_UNASSOCIATED_ALPHA;
            }
        }
        extra
    }

    fn sample_format(&self) -> u16 {
        match self.dtype {
            DataType::Float32 | DataType::Float64 => 3,
            DataType::Int16 | DataType::Int32 => 2,
            _ => 1,
        }
    }
}

fn write_tiff(
    cursor: &mut Cursor<Vec<u8>>,
    layout: &Layout,
    strip: &[u8],
    options: &EncodeOptions,
) -> tiff::TiffResult<()> {
    let mut encoder = TiffEncoder::new(cursor)?;
    let mut dir = encoder.image_directory()?;

    let bits = (layout.dtype.size() * 8) as u16;

    dir.write_tag(Tag::ImageWidth, layout.width)?;
    dir.write_tag(Tag::ImageLength, layout.height)?;
    dir.write_tag(Tag::BitsPerSample, vec![bits; layout.samples].as_slice())?;
    dir.write_tag(Tag::Compression, options.compression.tag_value())?;
    dir.write_tag(Tag::PhotometricInterpretation, layout.photometric())?;
    dir.write_tag(Tag::SamplesPerPixel, layout.samples as u16)?;
    dir.write_tag(
        Tag::SampleFormat,
        vec![layout.sample_format(); layout.samples].as_slice(),
    )?;
    dir.write_tag(Tag::PlanarConfiguration, 1u16)?;
    dir.write_tag(Tag::RowsPerStrip, layout.height)?;

    let extra = layout.extra_samples();
    if !extra.is_empty() {
        dir.write_tag(Tag::ExtraSamples, extra.as_slice())?;
    }

    if let Some(georef) = &options.georeference {
        write_geo_tags(&mut dir, georef)?;
    }

    let offset = dir.write_data(strip)?;
    let offset = u32::try_from(offset).map_err(|_| tiff::TiffError::LimitsExceeded)?;
    dir.write_tag(Tag::StripOffsets, offset)?;
    dir.write_tag(Tag::StripByteCounts, strip.len() as u32)?;

    dir.finish()
}

fn write_geo_tags<W: std::io::Write + std::io::Seek, K: tiff::encoder::TiffKind>(
    dir: &mut tiff::encoder::DirectoryEncoder<W, K>,
    georef: &Georeference,
) -> tiff::TiffResult<()> {
    let t = &georef.transform;

    if t.is_north_up() {
        let scale = [t.a, -t.e, 0.0];
        dir.write_tag(Tag::Unknown(TAG_MODEL_PIXEL_SCALE), scale.as_slice())?;

        let tiepoint = [0.0, 0.0, 0.0, t.c, t.f, 0.0];
        dir.write_tag(Tag::Unknown(TAG_MODEL_TIEPOINT), tiepoint.as_slice())?;
    } else {
        let matrix = [
            t.a, t.b, 0.0, t.c, //
            t.d, t.e, 0.0, t.f, //
            0.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        dir.write_tag(Tag::Unknown(TAG_MODEL_TRANSFORMATION), matrix.as_slice())?;
    }

    let citation = format!("{}|", georef.crs);
    let keys = geo_key_directory(georef, citation.len() as u16);
    dir.write_tag(Tag::Unknown(TAG_GEO_KEY_DIRECTORY), keys.as_slice())?;
    dir.write_tag(Tag::Unknown(TAG_GEO_ASCII_PARAMS), citation.as_str())?;

    Ok(())
}

/// GeoKeyDirectory: a 4-value header followed by 4-value key entries
/// `(id, location, count, value)`, sorted by key id.
fn geo_key_directory(georef: &Georeference, citation_len: u16) -> Vec<u16> {
    let geographic = georef.crs.is_geographic();
    let (model, crs_key) = if geographic {
        (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE_GEO_KEY)
    } else {
        (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE_GEO_KEY)
    };

    vec![
        1, 1, 0, 4, //
        GT_MODEL_TYPE_GEO_KEY, 0, 1, model, //
        GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA, //
        GT_CITATION_GEO_KEY, TAG_GEO_ASCII_PARAMS, citation_len, 0, //
        crs_key, 0, 1, georef.crs.epsg(),
    ]
}

/// Interleave bands (and alpha) and lay them out as little-endian bytes.
fn pixel_bytes<T: Sample>(arr: &Array3<T>, alpha: Option<&Mask>) -> Vec<u8> {
    let samples = interleave(arr, alpha, |m| T::from_f64(f64::from(m)));
    let mut out = Vec::with_capacity(samples.len() * T::DTYPE.size());
    for sample in samples {
        sample.write_le(&mut out);
    }
    out
}

fn deflate(raw: &[u8]) -> Result<Vec<u8>, PipelineError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(raw)
        .and_then(|_| encoder.finish())
        .map_err(|e| PipelineError::encoding(DRIVER, e.to_string()))
}
