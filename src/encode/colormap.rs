//! Pixel-value to RGBA lookup.

use std::collections::BTreeMap;

use ndarray::{Array3, Axis, Zip};

use crate::error::PipelineError;
use crate::tile::{with_tile_data, Mask, Sample, TileData};

/// Maps integer pixel values to `[r, g, b, a]`.
///
/// Serialized as a JSON object with stringified keys, e.g.
/// `{"1": [255, 0, 0, 255]}`.
pub type Colormap = BTreeMap<u16, [u8; 4]>;

/// Apply `colormap` to a single-band integer tile.
///
/// Returns a 3-band `u8` tile and an alpha mask. Alpha is 0 where the input
/// mask is 0, otherwise the colormap's alpha. Values missing from the map are
/// fully transparent.
pub fn apply_colormap(
    data: &TileData,
    mask: &Mask,
    colormap: &Colormap,
    driver: &'static str,
) -> Result<(TileData, Mask), PipelineError> {
    let (bands, rows, cols) = data.shape();
    if bands != 1 {
        return Err(PipelineError::encoding(
            driver,
            format!("colormap requires a single-band tile, got {bands} bands"),
        ));
    }
    if data.dtype().is_float() {
        return Err(PipelineError::encoding(
            driver,
            format!("colormap requires integer data, got {}", data.dtype()),
        ));
    }

    let mut rgb = Array3::<u8>::zeros((3, rows, cols));
    let mut alpha = Mask::zeros((rows, cols));

    with_tile_data!(data, arr => {
        let band = arr.index_axis(Axis(0), 0);
        Zip::indexed(&band).and(mask).for_each(|(row, col), value, &m| {
            let entry = lookup(colormap, value.to_f64());
            if let Some([r, g, b, a]) = entry {
                rgb[[0, row, col]] = r;
                rgb[[1, row, col]] = g;
                rgb[[2, row, col]] = b;
                alpha[[row, col]] = if m == 0 { 0 } else { a };
            }
        });
    });

    Ok((TileData::Uint8(rgb), alpha))
}

fn lookup(colormap: &Colormap, value: f64) -> Option<[u8; 4]> {
    if value < 0.0 || value > f64::from(u16::MAX) {
        return None;
    }
    colormap.get(&(value as u16)).copied()
}
