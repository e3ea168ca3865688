//! Tile buffers and validity masks.
//!
//! A tile is a 3-dimensional array with axes `(band, row, column)`. All bands
//! share one sample type, so the buffer is a closed enum over the supported
//! numeric types rather than a trait object: the encoders need to know the
//! concrete type to pick bit depth and sample format.

use std::fmt;

use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Per-pixel validity mask, shape `(rows, cols)`. Non-zero means valid.
pub type Mask = Array2<u8>;

/// Mask value written for valid pixels.
pub const MASK_VALID: u8 = 255;

/// Create a mask that marks every pixel valid.
pub fn full_mask(rows: usize, cols: usize) -> Mask {
    Array2::from_elem((rows, cols), MASK_VALID)
}

// =============================================================================
// Sample Types
// =============================================================================

/// Sample type of a tile buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Uint8,
    Uint16,
    Int16,
    Uint32,
    Int32,
    Float32,
    Float64,
}

impl DataType {
    /// Size of one sample in bytes.
    pub fn size(&self) -> usize {
        match self {
            DataType::Uint8 => 1,
            DataType::Uint16 | DataType::Int16 => 2,
            DataType::Uint32 | DataType::Int32 | DataType::Float32 => 4,
            DataType::Float64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// Largest representable value for integer types, `None` for floats.
    pub fn max_value(&self) -> Option<f64> {
        match self {
            DataType::Uint8 => Some(u8::MAX as f64),
            DataType::Uint16 => Some(u16::MAX as f64),
            DataType::Int16 => Some(i16::MAX as f64),
            DataType::Uint32 => Some(u32::MAX as f64),
            DataType::Int32 => Some(i32::MAX as f64),
            DataType::Float32 | DataType::Float64 => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Uint8 => "uint8",
            DataType::Uint16 => "uint16",
            DataType::Int16 => "int16",
            DataType::Uint32 => "uint32",
            DataType::Int32 => "int32",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A numeric sample type that can live in a [`TileData`] buffer.
pub trait Sample: Copy + Default + PartialOrd + Send + Sync + 'static {
    const DTYPE: DataType;

    fn to_f64(self) -> f64;

    /// Saturating, truncating conversion (NaN becomes zero for integer types).
    fn from_f64(value: f64) -> Self;

    fn write_le(self, out: &mut Vec<u8>);

    /// Read one sample from exactly `DTYPE.size()` little-endian bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_sample {
    ($t:ty, $dtype:expr) => {
        impl Sample for $t {
            const DTYPE: DataType = $dtype;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $t
            }

            #[inline]
            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(bytes);
                <$t>::from_le_bytes(buf)
            }
        }
    };
}

impl_sample!(u8, DataType::Uint8);
impl_sample!(u16, DataType::Uint16);
impl_sample!(i16, DataType::Int16);
impl_sample!(u32, DataType::Uint32);
impl_sample!(i32, DataType::Int32);
impl_sample!(f32, DataType::Float32);
impl_sample!(f64, DataType::Float64);

// =============================================================================
// Tile Buffer
// =============================================================================

/// A decoded tile buffer, axes `(band, row, column)`.
#[derive(Debug, Clone, PartialEq)]
pub enum TileData {
    Uint8(Array3<u8>),
    Uint16(Array3<u16>),
    Int16(Array3<i16>),
    Uint32(Array3<u32>),
    Int32(Array3<i32>),
    Float32(Array3<f32>),
    Float64(Array3<f64>),
}

/// Run `$body` with `$arr` bound to the inner array, whatever its sample type.
macro_rules! with_tile_data {
    ($data:expr, $arr:ident => $body:expr) => {
        match $data {
            $crate::tile::TileData::Uint8($arr) => $body,
            $crate::tile::TileData::Uint16($arr) => $body,
            $crate::tile::TileData::Int16($arr) => $body,
            $crate::tile::TileData::Uint32($arr) => $body,
            $crate::tile::TileData::Int32($arr) => $body,
            $crate::tile::TileData::Float32($arr) => $body,
            $crate::tile::TileData::Float64($arr) => $body,
        }
    };
}

pub(crate) use with_tile_data;

impl TileData {
    pub fn dtype(&self) -> DataType {
        match self {
            TileData::Uint8(_) => DataType::Uint8,
            TileData::Uint16(_) => DataType::Uint16,
            TileData::Int16(_) => DataType::Int16,
            TileData::Uint32(_) => DataType::Uint32,
            TileData::Int32(_) => DataType::Int32,
            TileData::Float32(_) => DataType::Float32,
            TileData::Float64(_) => DataType::Float64,
        }
    }

    /// `(bands, rows, cols)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        with_tile_data!(self, arr => arr.dim())
    }

    pub fn band_count(&self) -> usize {
        self.shape().0
    }

    /// Check the tile has at least one band and that the mask matches its
    /// `(rows, cols)` shape.
    pub fn validate_mask(&self, mask: &Mask) -> Result<(), PipelineError> {
        let (bands, rows, cols) = self.shape();
        if bands == 0 {
            return Err(PipelineError::InvalidTile("tile has no bands".to_string()));
        }
        if mask.dim() != (rows, cols) {
            return Err(PipelineError::InvalidTile(format!(
                "mask shape {:?} does not match tile shape ({}, {})",
                mask.dim(),
                rows,
                cols
            )));
        }
        Ok(())
    }

    /// Replace negative samples with zero. Unsigned buffers are untouched.
    pub fn clamp_negative(&mut self) {
        match self {
            TileData::Uint8(_) | TileData::Uint16(_) | TileData::Uint32(_) => {}
            TileData::Int16(arr) => arr.mapv_inplace(|v| v.max(0)),
            TileData::Int32(arr) => arr.mapv_inplace(|v| v.max(0)),
            TileData::Float32(arr) => arr.mapv_inplace(|v| if v < 0.0 { 0.0 } else { v }),
            TileData::Float64(arr) => arr.mapv_inplace(|v| if v < 0.0 { 0.0 } else { v }),
        }
    }

    /// Convert to the floating "math" representation used by color
    /// operations: values scaled into `[0, 1]`.
    ///
    /// Integer buffers are divided by their type's maximum. Float buffers are
    /// taken to already be in math range and are clamped to it.
    pub fn to_math(&self) -> Array3<f64> {
        match self.dtype().max_value() {
            Some(max) => with_tile_data!(self, arr => arr.mapv(|v| v.to_f64() / max)),
            None => with_tile_data!(self, arr => arr.mapv(|v| clamp_unit(v.to_f64()))),
        }
    }

    /// Convert a math-range array back to 8-bit samples (`trunc(v * 255)`).
    pub fn from_math(math: &Array3<f64>) -> TileData {
        TileData::Uint8(math.mapv(|v| (clamp_unit(v) * u8::MAX as f64) as u8))
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

macro_rules! impl_from_array {
    ($t:ty, $variant:ident) => {
        impl From<Array3<$t>> for TileData {
            fn from(arr: Array3<$t>) -> Self {
                TileData::$variant(arr)
            }
        }
    };
}

impl_from_array!(u8, Uint8);
impl_from_array!(u16, Uint16);
impl_from_array!(i16, Int16);
impl_from_array!(u32, Uint32);
impl_from_array!(i32, Int32);
impl_from_array!(f32, Float32);
impl_from_array!(f64, Float64);

// =============================================================================
// Tests
// =============================================================================
