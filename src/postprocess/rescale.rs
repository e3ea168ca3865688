//! Per-band linear rescaling to 8-bit.

use std::str::FromStr;

use ndarray::{Array3, Axis, Zip};

use crate::error::PipelineError;
use crate::tile::{with_tile_data, Mask, Sample, TileData};

/// Ordered `(min, max)` input ranges, one per band.
///
/// Parsed from a flat comma-separated list such as `"0,1000"` or
/// `"0,1000,0,2000,0,3000"`. When the number of pairs does not match the
/// tile's band count, the first pair is used for every band.
#[derive(Debug, Clone, PartialEq)]
pub struct RescaleSpec {
    pairs: Vec<(f64, f64)>,
}

impl RescaleSpec {
    pub fn new(pairs: Vec<(f64, f64)>) -> Result<Self, PipelineError> {
        if pairs.is_empty() {
            return Err(PipelineError::InvalidRescaleSpec(
                "at least one (min, max) pair is required".to_string(),
            ));
        }
        if let Some((min, max)) = pairs.iter().find(|(a, b)| !a.is_finite() || !b.is_finite()) {
            return Err(PipelineError::InvalidRescaleSpec(format!(
                "range ({min}, {max}) is not finite"
            )));
        }
        Ok(Self { pairs })
    }

    pub fn pairs(&self) -> &[(f64, f64)] {
        &self.pairs
    }

    /// Resolve the range applied to each of `bands` bands.
    pub fn ranges_for(&self, bands: usize) -> Result<Vec<(f64, f64)>, PipelineError> {
        let ranges = if self.pairs.len() == bands {
            self.pairs.clone()
        } else {
            vec![self.pairs[0]; bands]
        };

        for (band, &(min, max)) in ranges.iter().enumerate() {
            if min == max {
                return Err(PipelineError::InvalidRescaleRange {
                    band: band + 1,
                    value: min,
                });
            }
        }
        Ok(ranges)
    }

    /// Rescale every band into `0..=255`. Masked pixels become 0.
    pub fn apply(&self, tile: &TileData, mask: &Mask) -> Result<TileData, PipelineError> {
        tile.validate_mask(mask)?;
        let (bands, rows, cols) = tile.shape();
        let ranges = self.ranges_for(bands)?;
        let mut out = Array3::<u8>::zeros((bands, rows, cols));

        with_tile_data!(tile, arr => {
            for (band, &(min, max)) in ranges.iter().enumerate() {
                Zip::from(out.index_axis_mut(Axis(0), band))
                    .and(arr.index_axis(Axis(0), band))
                    .and(mask)
                    .for_each(|o, v, &m| {
                        *o = if m == 0 { 0 } else { linear_rescale(v.to_f64(), min, max) };
                    });
            }
        });

        Ok(TileData::Uint8(out))
    }
}

impl FromStr for RescaleSpec {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|part| {
                part.trim().parse::<f64>().map_err(|_| {
                    PipelineError::InvalidRescaleSpec(format!("'{}' is not a number", part.trim()))
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        if values.len() % 2 != 0 {
            return Err(PipelineError::InvalidRescaleSpec(format!(
                "expected (min, max) pairs, got {} values",
                values.len()
            )));
        }

        Self::new(values.chunks_exact(2).map(|c| (c[0], c[1])).collect())
    }
}

/// Map `value` from `[min, max]` onto `0..=255`, clamping outside the range.
/// `min > max` gives an inverted ramp.
fn linear_rescale(value: f64, min: f64, max: f64) -> u8 {
    let t = ((value - min) / (max - min)).clamp(0.0, 1.0);
    // NaN saturates to 0 on the cast
    (t * 255.0) as u8
}
