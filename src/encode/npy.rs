//! Raw numeric dumps in NPY format.
//!
//! A tile dump is two NPY v1.0 records back to back: the tile itself,
//! shape `(bands, rows, cols)` in its own dtype, then the mask, shape
//! `(rows, cols)` as `|u1`.
//!
//! Record layout:
//!
//! ```text
//! \x93NUMPY | major | minor | header_len (u16 LE) | header dict ... \n | data
//! ```
//!
//! The preamble plus header is padded with spaces to a multiple of 64 bytes.

use ndarray::{Array2, Array3, ArrayD, IxDyn};

use crate::error::NpyError;
use crate::tile::{full_mask, with_tile_data, DataType, Mask, Sample, TileData};

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const ALIGNMENT: usize = 64;

/// Dtype descriptor written for each sample type (little-endian).
pub fn descr(dtype: DataType) -> &'static str {
    match dtype {
        DataType::Uint8 => "|u1",
        DataType::Uint16 => "<u2",
        DataType::Int16 => "<i2",
        DataType::Uint32 => "<u4",
        DataType::Int32 => "<i4",
        DataType::Float32 => "<f4",
        DataType::Float64 => "<f8",
    }
}

/// Element type of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NpyDtype {
    Bool,
    Data(DataType),
}

impl NpyDtype {
    fn parse(descr: &str) -> Result<Self, NpyError> {
        let dtype = match descr {
            "|b1" | "b1" => return Ok(NpyDtype::Bool),
            "|u1" | "<u1" | "u1" => DataType::Uint8,
            "<u2" => DataType::Uint16,
            "<i2" => DataType::Int16,
            "<u4" => DataType::Uint32,
            "<i4" => DataType::Int32,
            "<f4" => DataType::Float32,
            "<f8" => DataType::Float64,
            other => return Err(NpyError::UnsupportedDtype(other.to_string())),
        };
        Ok(NpyDtype::Data(dtype))
    }

    fn size(&self) -> usize {
        match self {
            NpyDtype::Bool => 1,
            NpyDtype::Data(dtype) => dtype.size(),
        }
    }
}

/// One decoded NPY record, borrowing its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyRecord<'a> {
    pub dtype: NpyDtype,
    pub shape: Vec<usize>,
    pub data: &'a [u8],
}

impl NpyRecord<'_> {
    /// Element count implied by the shape.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Interpret as a tile. 2-D records become a single band.
    pub fn to_tile(&self) -> Result<TileData, NpyError> {
        let shape = match self.shape.as_slice() {
            [rows, cols] => vec![1, *rows, *cols],
            [_, _, _] => self.shape.clone(),
            other => {
                return Err(NpyError::Shape(format!(
                    "expected 2 or 3 dimensions for a tile, got {other:?}"
                )))
            }
        };

        let dtype = match self.dtype {
            NpyDtype::Data(dtype) => dtype,
            NpyDtype::Bool => DataType::Uint8,
        };

        Ok(match dtype {
            DataType::Uint8 => TileData::Uint8(self.array3(&shape)?),
            DataType::Uint16 => TileData::Uint16(self.array3(&shape)?),
            DataType::Int16 => TileData::Int16(self.array3(&shape)?),
            DataType::Uint32 => TileData::Uint32(self.array3(&shape)?),
            DataType::Int32 => TileData::Int32(self.array3(&shape)?),
            DataType::Float32 => TileData::Float32(self.array3(&shape)?),
            DataType::Float64 => TileData::Float64(self.array3(&shape)?),
        })
    }

    /// Interpret as a validity mask. Boolean masks map `true` to 255.
    pub fn to_mask(&self) -> Result<Mask, NpyError> {
        let [rows, cols] = self.shape.as_slice() else {
            return Err(NpyError::Shape(format!(
                "expected 2 dimensions for a mask, got {:?}",
                self.shape
            )));
        };
        if !matches!(self.dtype, NpyDtype::Bool | NpyDtype::Data(DataType::Uint8)) {
            return Err(NpyError::UnsupportedDtype(format!(
                "mask must be uint8 or bool, got {:?}",
                self.dtype
            )));
        }

        let values: Vec<u8> = match self.dtype {
            NpyDtype::Bool => self.data.iter().map(|&b| if b != 0 { 255 } else { 0 }).collect(),
            _ => self.data.to_vec(),
        };
        Array2::from_shape_vec((*rows, *cols), values).map_err(|e| NpyError::Shape(e.to_string()))
    }

    fn array3<T: Sample>(&self, shape: &[usize]) -> Result<Array3<T>, NpyError> {
        let values: Vec<T> = self
            .data
            .chunks_exact(T::DTYPE.size())
            .map(T::read_le)
            .collect();
        ArrayD::from_shape_vec(IxDyn(shape), values)
            .and_then(|a| a.into_dimensionality())
            .map_err(|e| NpyError::Shape(e.to_string()))
    }
}

// =============================================================================
// Writing
// =============================================================================

/// Serialize a tile and its mask as two consecutive NPY records.
pub fn encode_npy(data: &TileData, mask: &Mask) -> Vec<u8> {
    let (bands, rows, cols) = data.shape();
    let mut out = Vec::new();

    write_header(&mut out, descr(data.dtype()), &[bands, rows, cols]);
    with_tile_data!(data, arr => {
        for &v in arr.iter() {
            v.write_le(&mut out);
        }
    });

    let (mask_rows, mask_cols) = mask.dim();
    write_header(&mut out, descr(DataType::Uint8), &[mask_rows, mask_cols]);
    out.extend(mask.iter().copied());

    out
}

fn write_header(out: &mut Vec<u8>, descr: &str, shape: &[usize]) {
    let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
    let shape = if dims.len() == 1 {
        format!("({},)", dims[0])
    } else {
        format!("({})", dims.join(", "))
    };
    let dict = format!("{{'descr': '{descr}', 'fortran_order': False, 'shape': {shape}, }}");

    // magic(6) + version(2) + header_len(2) + dict + '\n', padded
    let unpadded = MAGIC.len() + 4 + dict.len() + 1;
    let pad = (ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT;
    let header_len = dict.len() + pad + 1;

    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header_len as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out.extend(std::iter::repeat(b' ').take(pad));
    out.push(b'\n');
}

// =============================================================================
// Reading
// =============================================================================

/// Read one record from the front of `bytes`. Returns the record and the
/// unread remainder.
pub fn read_npy_array(bytes: &[u8]) -> Result<(NpyRecord<'_>, &[u8]), NpyError> {
    if bytes.len() < MAGIC.len() + 2 || &bytes[..MAGIC.len()] != MAGIC {
        return Err(NpyError::InvalidMagic);
    }

    let major = bytes[6];
    let (len_size, header_len) = match major {
        1 => (2, le_len(&bytes[8..], 2)?),
        2 | 3 => (4, le_len(&bytes[8..], 4)?),
        other => return Err(NpyError::UnsupportedVersion(other)),
    };

    let header_start = 8 + len_size;
    let data_start = header_start + header_len;
    let header = bytes
        .get(header_start..data_start)
        .ok_or(NpyError::Truncated {
            expected: data_start,
            actual: bytes.len(),
        })?;
    let header = std::str::from_utf8(header)
        .map_err(|_| NpyError::MalformedHeader("header is not valid text".to_string()))?;

    let dtype = NpyDtype::parse(&quoted_value(header, "descr")?)?;
    if field(header, "fortran_order")?.starts_with("True") {
        return Err(NpyError::FortranOrder);
    }
    let shape = parse_shape(field(header, "shape")?)?;

    let data_end = shape
        .iter()
        .try_fold(dtype.size(), |acc, &dim| acc.checked_mul(dim))
        .and_then(|len| len.checked_add(data_start))
        .ok_or_else(|| NpyError::Shape(format!("shape {shape:?} is too large")))?;
    let data = bytes.get(data_start..data_end).ok_or(NpyError::Truncated {
        expected: data_end,
        actual: bytes.len(),
    })?;

    Ok((NpyRecord { dtype, shape, data }, &bytes[data_end..]))
}

/// Read a tile dump: a tile record optionally followed by a mask record.
/// Without a mask record every pixel is valid.
pub fn decode_npy(bytes: &[u8]) -> Result<(TileData, Mask), NpyError> {
    let (tile_record, rest) = read_npy_array(bytes)?;
    let tile = tile_record.to_tile()?;
    let (_, rows, cols) = tile.shape();

    let mask = if rest.is_empty() {
        full_mask(rows, cols)
    } else {
        let (mask_record, _) = read_npy_array(rest)?;
        let mask = mask_record.to_mask()?;
        if mask.dim() != (rows, cols) {
            return Err(NpyError::Shape(format!(
                "mask shape {:?} does not match tile ({rows}, {cols})",
                mask.dim()
            )));
        }
        mask
    };

    Ok((tile, mask))
}

fn le_len(bytes: &[u8], size: usize) -> Result<usize, NpyError> {
    let raw = bytes.get(..size).ok_or(NpyError::Truncated {
        expected: size,
        actual: bytes.len(),
    })?;
    Ok(raw
        .iter()
        .rev()
        .fold(0usize, |acc, &b| (acc << 8) | usize::from(b)))
}

/// Text following `'key':` in the header dict.
fn field<'a>(header: &'a str, key: &str) -> Result<&'a str, NpyError> {
    let quoted = [format!("'{key}'"), format!("\"{key}\"")];
    let start = quoted
        .iter()
        .find_map(|k| header.find(k.as_str()).map(|i| i + k.len()))
        .ok_or_else(|| NpyError::MalformedHeader(format!("missing '{key}'")))?;

    let rest = header[start..].trim_start();
    let rest = rest
        .strip_prefix(':')
        .ok_or_else(|| NpyError::MalformedHeader(format!("expected ':' after '{key}'")))?;
    Ok(rest.trim_start())
}

fn quoted_value(header: &str, key: &str) -> Result<String, NpyError> {
    let rest = field(header, key)?;
    let quote = rest
        .chars()
        .next()
        .filter(|c| *c == '\'' || *c == '"')
        .ok_or_else(|| NpyError::MalformedHeader(format!("'{key}' is not a string")))?;
    let body = &rest[1..];
    let end = body
        .find(quote)
        .ok_or_else(|| NpyError::MalformedHeader(format!("unterminated '{key}'")))?;
    Ok(body[..end].to_string())
}

fn parse_shape(rest: &str) -> Result<Vec<usize>, NpyError> {
    let inner = rest
        .strip_prefix('(')
        .and_then(|r| r.find(')').map(|end| &r[..end]))
        .ok_or_else(|| NpyError::MalformedHeader("shape is not a tuple".to_string()))?;

    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| NpyError::MalformedHeader(format!("bad dimension '{s}'")))
        })
        .collect()
}
