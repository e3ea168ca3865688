//! PNG, JPEG and WEBP drivers built on the `image` crate.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder};
use ndarray::Array3;

use super::format::{Driver, EncodeOptions};
use crate::error::PipelineError;
use crate::tile::{Mask, Sample, TileData};

/// Default JPEG quality when none is configured.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Encode through the `image` crate. `mask` becomes the alpha channel when
/// `options.alpha` is set and the driver supports it.
pub fn encode_image(
    driver: Driver,
    data: &TileData,
    mask: &Mask,
    options: &EncodeOptions,
) -> Result<Vec<u8>, PipelineError> {
    let name = driver.name();
    let (bands, rows, cols) = data.shape();
    if rows == 0 || cols == 0 {
        return Err(PipelineError::encoding(name, "tile has zero width or height"));
    }
    if bands != 1 && bands != 3 {
        return Err(PipelineError::encoding(
            name,
            format!("expected 1 or 3 bands, got {bands}"),
        ));
    }

    let alpha = match driver {
        Driver::Jpeg => None,
        _ if options.alpha => Some(mask),
        _ => None,
    };
    let (width, height) = (cols as u32, rows as u32);

    let (bytes, color) = match data {
        TileData::Uint8(arr) => (
            interleave(arr, alpha, |m| m),
            color_type_8(bands, alpha.is_some()),
        ),
        TileData::Uint16(arr) if driver == Driver::Png => {
            // 16-bit buffers are handed over in native byte order
            let samples = interleave(arr, alpha, |m| u16::from(m) * 257);
            let bytes: Vec<u8> = samples.iter().flat_map(|v| v.to_ne_bytes()).collect();
            (bytes, color_type_16(bands, alpha.is_some()))
        }
        other => {
            return Err(PipelineError::encoding(
                name,
                format!("{} data is not supported", other.dtype()),
            ))
        }
    };

    let mut output = Cursor::new(Vec::new());
    let result = match driver {
        Driver::Png => PngEncoder::new(&mut output).write_image(&bytes, width, height, color),
        Driver::Jpeg => {
            let quality = options.quality.unwrap_or(DEFAULT_JPEG_QUALITY).clamp(1, 100);
            JpegEncoder::new_with_quality(&mut output, quality)
                .write_image(&bytes, width, height, color)
        }
        Driver::Webp => {
            if !options.lossless {
                return Err(PipelineError::encoding(name, "only lossless WEBP is supported"));
            }
            WebPEncoder::new_lossless(&mut output).write_image(&bytes, width, height, color)
        }
        Driver::GTiff | Driver::Npy => {
            return Err(PipelineError::encoding(name, "not an image crate driver"))
        }
    };

    result.map_err(|e| PipelineError::encoding(name, e.to_string()))?;
    Ok(output.into_inner())
}

fn color_type_8(bands: usize, alpha: bool) -> ExtendedColorType {
    match (bands, alpha) {
        (1, false) => ExtendedColorType::L8,
        (1, true) => ExtendedColorType::La8,
        (_, false) => ExtendedColorType::Rgb8,
        (_, true) => ExtendedColorType::Rgba8,
    }
}

fn color_type_16(bands: usize, alpha: bool) -> ExtendedColorType {
    match (bands, alpha) {
        (1, false) => ExtendedColorType::L16,
        (1, true) => ExtendedColorType::La16,
        (_, false) => ExtendedColorType::Rgb16,
        (_, true) => ExtendedColorType::Rgba16,
    }
}

/// Band-sequential `(band, row, col)` to pixel-interleaved samples, with the
/// mask appended as a final channel when given.
pub(crate) fn interleave<T: Sample>(
    arr: &Array3<T>,
    alpha: Option<&Mask>,
    alpha_value: impl Fn(u8) -> T,
) -> Vec<T> {
    let (bands, rows, cols) = arr.dim();
    let channels = bands + usize::from(alpha.is_some());
    let mut out = Vec::with_capacity(rows * cols * channels);

    for row in 0..rows {
        for col in 0..cols {
            for band in 0..bands {
                out.push(arr[[band, row, col]]);
            }
            if let Some(mask) = alpha {
                out.push(alpha_value(mask[[row, col]]));
            }
        }
    }
    out
}
