//! Canonical JSON encoder for signing and content addressing.
//!
//! Canonical rules:
//! - object keys sorted by UTF-8 byte order, recursively
//! - no insignificant whitespace
//! - numbers formatted by `serde_json` (shortest round-trip form)
//! - NaN and infinities rejected; `serde_json` would silently write `null`
//!
//! Keys are sorted here, not by `serde_json::Map`: its iteration order
//! follows insertion once `preserve_order` is enabled in the build.

use std::fmt;

use serde::Serialize;
use serde::ser::{
    self, SerializeMap, SerializeSeq, SerializeStruct, SerializeStructVariant, SerializeTuple,
    SerializeTupleStruct, SerializeTupleVariant, Serializer,
};
use serde_json::{Map, Value};

/// Errors from canonical encoding.
#[derive(Debug, thiserror::Error)]
pub enum CanonicalError {
    /// The value could not be represented as JSON.
    #[error("json encode failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The value contains NaN or an infinity.
    #[error("non-finite float values are not allowed")]
    NonFiniteFloat,
}

/// Serialize a value to canonical JSON bytes.
pub fn to_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    ensure_finite(value)?;
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&canonicalize(value))?)
}

/// Rebuild a JSON value with every object's keys in sorted order.
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            let mut canon = Map::new();
            for (key, value) in entries {
                canon.insert(key, canonicalize(value));
            }
            Value::Object(canon)
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

fn ensure_finite<T: Serialize + ?Sized>(value: &T) -> Result<(), CanonicalError> {
    match value.serialize(FiniteCheck) {
        Err(FloatCheckError::NonFinite) => Err(CanonicalError::NonFiniteFloat),
        // Other failures are reported by the real encoder.
        Ok(()) | Err(FloatCheckError::Other) => Ok(()),
    }
}

#[derive(Debug)]
enum FloatCheckError {
    NonFinite,
    Other,
}

impl fmt::Display for FloatCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFinite => f.write_str("non-finite float"),
            Self::Other => f.write_str("serialization failed"),
        }
    }
}

impl std::error::Error for FloatCheckError {}

impl ser::Error for FloatCheckError {
    fn custom<T: fmt::Display>(_msg: T) -> Self {
        Self::Other
    }
}

/// Walks a value without producing output, failing on the first
/// non-finite float.
struct FiniteCheck;

type Check = Result<(), FloatCheckError>;

fn check_float(finite: bool) -> Check {
    if finite {
        Ok(())
    } else {
        Err(FloatCheckError::NonFinite)
    }
}

impl Serializer for FiniteCheck {
    type Ok = ();
    type Error = FloatCheckError;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, _v: bool) -> Check {
        Ok(())
    }
    fn serialize_i8(self, _v: i8) -> Check {
        Ok(())
    }
    fn serialize_i16(self, _v: i16) -> Check {
        Ok(())
    }
    fn serialize_i32(self, _v: i32) -> Check {
        Ok(())
    }
    fn serialize_i64(self, _v: i64) -> Check {
        Ok(())
    }
    fn serialize_u8(self, _v: u8) -> Check {
        Ok(())
    }
    fn serialize_u16(self, _v: u16) -> Check {
        Ok(())
    }
    fn serialize_u32(self, _v: u32) -> Check {
        Ok(())
    }
    fn serialize_u64(self, _v: u64) -> Check {
        Ok(())
    }
    fn serialize_f32(self, v: f32) -> Check {
        check_float(v.is_finite())
    }
    fn serialize_f64(self, v: f64) -> Check {
        check_float(v.is_finite())
    }
    fn serialize_char(self, _v: char) -> Check {
        Ok(())
    }
    fn serialize_str(self, _v: &str) -> Check {
        Ok(())
    }
    fn serialize_bytes(self, _v: &[u8]) -> Check {
        Ok(())
    }
    fn serialize_none(self) -> Check {
        Ok(())
    }
    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Check {
        value.serialize(self)
    }
    fn serialize_unit(self) -> Check {
        Ok(())
    }
    fn serialize_unit_struct(self, _name: &'static str) -> Check {
        Ok(())
    }
    fn serialize_unit_variant(self, _name: &'static str, _index: u32, _variant: &'static str) -> Check {
        Ok(())
    }
    fn serialize_newtype_struct<T: ?Sized + Serialize>(self, _name: &'static str, value: &T) -> Check {
        value.serialize(self)
    }
    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Check {
        value.serialize(self)
    }
    fn serialize_seq(self, _len: Option<usize>) -> Result<Self, FloatCheckError> {
        Ok(self)
    }
    fn serialize_tuple(self, _len: usize) -> Result<Self, FloatCheckError> {
        Ok(self)
    }
    fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> Result<Self, FloatCheckError> {
        Ok(self)
    }
    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, FloatCheckError> {
        Ok(self)
    }
    fn serialize_map(self, _len: Option<usize>) -> Result<Self, FloatCheckError> {
        Ok(self)
    }
    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self, FloatCheckError> {
        Ok(self)
    }
    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, FloatCheckError> {
        Ok(self)
    }
}

impl SerializeSeq for FiniteCheck {
    type Ok = ();
    type Error = FloatCheckError;
    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Check {
        value.serialize(FiniteCheck)
    }
    fn end(self) -> Check {
        Ok(())
    }
}

impl SerializeTuple for FiniteCheck {
    type Ok = ();
    type Error = FloatCheckError;
    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Check {
        value.serialize(FiniteCheck)
    }
    fn end(self) -> Check {
        Ok(())
    }
}

impl SerializeTupleStruct for FiniteCheck {
    type Ok = ();
    type Error = FloatCheckError;
    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Check {
        value.serialize(FiniteCheck)
    }
    fn end(self) -> Check {
        Ok(())
    }
}

impl SerializeTupleVariant for FiniteCheck {
    type Ok = ();
    type Error = FloatCheckError;
    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Check {
        value.serialize(FiniteCheck)
    }
    fn end(self) -> Check {
        Ok(())
    }
}

impl SerializeMap for FiniteCheck {
    type Ok = ();
    type Error = FloatCheckError;
    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Check {
        key.serialize(FiniteCheck)
    }
    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Check {
        value.serialize(FiniteCheck)
    }
    fn end(self) -> Check {
        Ok(())
    }
}

impl SerializeStruct for FiniteCheck {
    type Ok = ();
    type Error = FloatCheckError;
    fn serialize_field<T: ?Sized + Serialize>(&mut self, _key: &'static str, value: &T) -> Check {
        value.serialize(FiniteCheck)
    }
    fn end(self) -> Check {
        Ok(())
    }
}

impl SerializeStructVariant for FiniteCheck {
    type Ok = ();
    type Error = FloatCheckError;
    fn serialize_field<T: ?Sized + Serialize>(&mut self, _key: &'static str, value: &T) -> Check {
        value.serialize(FiniteCheck)
    }
    fn end(self) -> Check {
        Ok(())
    }
}
