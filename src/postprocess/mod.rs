//! Pixel post-processing.
//!
//! Two optional steps run on a decoded tile, in this order:
//!
//! ```text
//!   TileData (any dtype)
//!        │
//!        ▼  rescale "min,max[,min,max...]"     (masked pixels -> 0, dtype -> u8)
//!        │
//!        ▼  color formula "gamma rgb 1.5 ..."  (clamp < 0, per op: math -> op -> u8)
//!        │
//!   TileData
//! ```
//!
//! With neither step requested the tile is returned untouched.

mod colorspace;
mod formula;
mod rescale;

pub use colorspace::{lch_to_rgb, rgb_to_lch, Lch};
pub use formula::{Bands, ColorFormula, ColorOp};
pub use rescale::RescaleSpec;

use crate::error::PipelineError;
use crate::tile::{Mask, TileData};

/// Pre-parsed post-processing parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostProcessOptions {
    pub rescale: Option<RescaleSpec>,
    pub color_formula: Option<ColorFormula>,
}

impl PostProcessOptions {
    /// Parse raw request strings. Empty or blank strings count as absent.
    pub fn parse(
        rescale: Option<&str>,
        color_formula: Option<&str>,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            rescale: non_blank(rescale).map(str::parse).transpose()?,
            color_formula: non_blank(color_formula).map(str::parse).transpose()?,
        })
    }

    pub fn is_noop(&self) -> bool {
        self.rescale.is_none() && self.color_formula.is_none()
    }

    /// Run the configured steps on `tile`.
    ///
    /// All checks that depend on the tile (mask shape, rescale ranges, formula
    /// bands) happen before any pixel is touched.
    pub fn apply(&self, tile: TileData, mask: &Mask) -> Result<TileData, PipelineError> {
        tile.validate_mask(mask)?;
        if self.is_noop() {
            return Ok(tile);
        }

        let bands = tile.band_count();
        if let Some(rescale) = &self.rescale {
            rescale.ranges_for(bands)?;
        }
        if let Some(formula) = &self.color_formula {
            formula.check_bands(bands)?;
        }

        let mut tile = match &self.rescale {
            Some(rescale) => rescale.apply(&tile, mask)?,
            None => tile,
        };

        if let Some(formula) = &self.color_formula {
            tile.clamp_negative();
            for op in formula.ops() {
                let mut math = tile.to_math();
                op.apply(&mut math);
                tile = TileData::from_math(&math);
            }
        }

        Ok(tile)
    }
}

/// Rescale and color-correct a tile.
///
/// `rescale` is a comma-separated list of `min,max` pairs; `color_formula` is
/// a sequence of color operations (see [`ColorFormula`]). Either may be
/// `None`. The tile is consumed.
pub fn postprocess(
    tile: TileData,
    mask: &Mask,
    rescale: Option<&str>,
    color_formula: Option<&str>,
) -> Result<TileData, PipelineError> {
    PostProcessOptions::parse(rescale, color_formula)?.apply(tile, mask)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}
