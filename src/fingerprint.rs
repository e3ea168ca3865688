//! Content-addressed cache fingerprints.
//!
//! A fingerprint is the lowercase hex SHA-224 digest of the canonical JSON
//! form of a request's parameters. Canonical means object keys are sorted at
//! every nesting level and no insignificant whitespace is emitted, so two
//! parameter sets that differ only in key insertion order hash identically.
//!
//! ```
//! use raster_tiler::fingerprint::fingerprint;
//! use serde_json::json;
//!
//! let a = fingerprint(&json!({"z": 3, "format": "png"})).unwrap();
//! let b = fingerprint(&json!({"format": "png", "z": 3})).unwrap();
//! assert_eq!(a, b);
//! assert_eq!(a.len(), 56);
//! ```

use std::fmt::{self, Display};

use serde::ser::{self, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha224};

use crate::error::PipelineError;

/// Derive the fingerprint of any serializable parameter set.
///
/// Fails with [`PipelineError::SerializationError`] if the parameters contain
/// a non-finite float or a map keyed by something other than strings.
pub fn fingerprint<T: Serialize + ?Sized>(params: &T) -> Result<String, PipelineError> {
    // serde_json maps NaN and infinities to `null`, which would silently
    // collide with absent values. Reject them before converting.
    params
        .serialize(FiniteProbe)
        .map_err(|e| PipelineError::SerializationError(e.to_string()))?;

    let value =
        serde_json::to_value(params).map_err(|e| PipelineError::SerializationError(e.to_string()))?;

    Ok(fingerprint_value(&value))
}

/// Fingerprint an already-converted JSON value.
pub fn fingerprint_value(value: &Value) -> String {
    let canonical = canonical_json(value);
    hex::encode(Sha224::digest(canonical.as_bytes()))
}

/// Render `value` as compact JSON with object keys sorted.
///
/// `serde_json::Map` is ordered by key unless the `preserve_order` feature is
/// enabled, which this crate never turns on.
pub fn canonical_json(value: &Value) -> String {
    value.to_string()
}

// =============================================================================
// Non-finite float probe
// =============================================================================

#[derive(Debug)]
struct ProbeError(String);

impl Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ProbeError {}

impl ser::Error for ProbeError {
    fn custom<T: Display>(msg: T) -> Self {
        ProbeError(msg.to_string())
    }
}

/// Serializer that walks a value and fails on the first non-finite float.
/// Produces nothing.
struct FiniteProbe;

fn check_finite(value: f64) -> Result<(), ProbeError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ProbeError(format!("non-finite float {value} cannot be fingerprinted")))
    }
}

impl ser::Serializer for FiniteProbe {
    type Ok = ();
    type Error = ProbeError;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, _: bool) -> Result<(), ProbeError> {
        Ok(())
    }
    fn serialize_i8(self, _: i8) -> Result<(), ProbeError> {
        Ok(())
    }
    fn serialize_i16(self, _: i16) -> Result<(), ProbeError> {
        Ok(())
    }
    fn serialize_i32(self, _: i32) -> Result<(), ProbeError> {
        Ok(())
    }
    fn serialize_i64(self, _: i64) -> Result<(), ProbeError> {
        Ok(())
    }
    fn serialize_u8(self, _: u8) -> Result<(), ProbeError> {
        Ok(())
    }
    fn serialize_u16(self, _: u16) -> Result<(), ProbeError> {
        Ok(())
    }
    fn serialize_u32(self, _: u32) -> Result<(), ProbeError> {
        Ok(())
    }
    fn serialize_u64(self, _: u64) -> Result<(), ProbeError> {
        Ok(())
    }
    fn serialize_f32(self, v: f32) -> Result<(), ProbeError> {
        check_finite(v as f64)
    }
    fn serialize_f64(self, v: f64) -> Result<(), ProbeError> {
        check_finite(v)
    }
    fn serialize_char(self, _: char) -> Result<(), ProbeError> {
        Ok(())
    }
    fn serialize_str(self, _: &str) -> Result<(), ProbeError> {
        Ok(())
    }
    fn serialize_bytes(self, _: &[u8]) -> Result<(), ProbeError> {
        Ok(())
    }
    fn serialize_none(self) -> Result<(), ProbeError> {
        Ok(())
    }
    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<(), ProbeError> {
        value.serialize(self)
    }
    fn serialize_unit(self) -> Result<(), ProbeError> {
        Ok(())
    }
    fn serialize_unit_struct(self, _: &'static str) -> Result<(), ProbeError> {
        Ok(())
    }
    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
    ) -> Result<(), ProbeError> {
        Ok(())
    }
    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        value: &T,
    ) -> Result<(), ProbeError> {
        value.serialize(self)
    }
    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> Result<(), ProbeError> {
        value.serialize(self)
    }
    fn serialize_seq(self, _: Option<usize>) -> Result<Self, ProbeError> {
        Ok(self)
    }
    fn serialize_tuple(self, _: usize) -> Result<Self, ProbeError> {
        Ok(self)
    }
    fn serialize_tuple_struct(self, _: &'static str, _: usize) -> Result<Self, ProbeError> {
        Ok(self)
    }
    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self, ProbeError> {
        Ok(self)
    }
    fn serialize_map(self, _: Option<usize>) -> Result<Self, ProbeError> {
        Ok(self)
    }
    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self, ProbeError> {
        Ok(self)
    }
    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self, ProbeError> {
        Ok(self)
    }
}

impl ser::SerializeSeq for FiniteProbe {
    type Ok = ();
    type Error = ProbeError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ProbeError> {
        value.serialize(FiniteProbe)
    }
    fn end(self) -> Result<(), ProbeError> {
        Ok(())
    }
}

impl ser::SerializeTuple for FiniteProbe {
    type Ok = ();
    type Error = ProbeError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ProbeError> {
        value.serialize(FiniteProbe)
    }
    fn end(self) -> Result<(), ProbeError> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for FiniteProbe {
    type Ok = ();
    type Error = ProbeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ProbeError> {
        value.serialize(FiniteProbe)
    }
    fn end(self) -> Result<(), ProbeError> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for FiniteProbe {
    type Ok = ();
    type Error = ProbeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ProbeError> {
        value.serialize(FiniteProbe)
    }
    fn end(self) -> Result<(), ProbeError> {
        Ok(())
    }
}

impl ser::SerializeMap for FiniteProbe {
    type Ok = ();
    type Error = ProbeError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), ProbeError> {
        key.serialize(FiniteProbe)
    }
    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ProbeError> {
        value.serialize(FiniteProbe)
    }
    fn end(self) -> Result<(), ProbeError> {
        Ok(())
    }
}

impl ser::SerializeStruct for FiniteProbe {
    type Ok = ();
    type Error = ProbeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _: &'static str,
        value: &T,
    ) -> Result<(), ProbeError> {
        value.serialize(FiniteProbe)
    }
    fn end(self) -> Result<(), ProbeError> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FiniteProbe {
    type Ok = ();
    type Error = ProbeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _: &'static str,
        value: &T,
    ) -> Result<(), ProbeError> {
        value.serialize(FiniteProbe)
    }
    fn end(self) -> Result<(), ProbeError> {
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
