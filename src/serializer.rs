//! Tagged value serialization
//!
//! Wire format: `[1 byte: format tag][N bytes: payload]`
//!
//! Encoding tries the structured JSON form first (primitives, sequences,
//! string-keyed maps, serde-coerced timestamps). Values JSON cannot express,
//! such as maps with composite keys or non-finite floats, fall back to
//! MessagePack. The tag is written at encode time so decode is a
//! deterministic dispatch, never a guess between structurally similar
//! payloads.
//!
//! Decode failure is non-fatal by contract: the client logs it and treats
//! the entry as a miss.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::CacheError;

/// Format tag, first byte of every encoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Format {
    /// Structured JSON payload
    Json = b'J',
    /// MessagePack payload (fallback for non-JSON-expressible values)
    MsgPack = b'M',
}

impl Format {
    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'J' => Some(Format::Json),
            b'M' => Some(Format::MsgPack),
            _ => None,
        }
    }
}

/// Stateless tagged codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct Serializer;

impl Serializer {
    pub fn new() -> Self {
        Self
    }

    /// Encode a value, preferring JSON and falling back to MessagePack.
    ///
    /// Non-finite floats take the MessagePack branch up front: `serde_json`
    /// would silently render them as `null`, which decodes back as a typed
    /// failure instead of the stored value.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Bytes, CacheError> {
        if value.serialize(FiniteCheck).is_err() {
            trace!("value contains non-finite floats, encoding as MessagePack");
            let payload = rmp_serde::to_vec_named(value).map_err(|e| {
                CacheError::Serialization(format!("value not encodable: msgpack: {e}"))
            })?;
            return Ok(Self::tagged(Format::MsgPack, &payload));
        }

        match serde_json::to_vec(value) {
            Ok(payload) => Ok(Self::tagged(Format::Json, &payload)),
            Err(json_err) => {
                trace!(error = %json_err, "JSON encoding failed, falling back to MessagePack");
                let payload = rmp_serde::to_vec_named(value).map_err(|e| {
                    CacheError::Serialization(format!(
                        "value not encodable: json: {json_err}; msgpack: {e}"
                    ))
                })?;
                Ok(Self::tagged(Format::MsgPack, &payload))
            }
        }
    }

    /// Decode a tagged value, dispatching on the format byte.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CacheError> {
        let (&tag, payload) = bytes
            .split_first()
            .ok_or_else(|| CacheError::Serialization("empty value".to_string()))?;

        match Format::from_tag(tag) {
            Some(Format::Json) => serde_json::from_slice(payload)
                .map_err(|e| CacheError::Serialization(format!("JSON decode failed: {e}"))),
            Some(Format::MsgPack) => rmp_serde::from_slice(payload)
                .map_err(|e| CacheError::Serialization(format!("MessagePack decode failed: {e}"))),
            None => Err(CacheError::Serialization(format!(
                "unknown format tag 0x{tag:02x}"
            ))),
        }
    }

    /// Format of an encoded value, if the tag is recognized.
    pub fn format_of(bytes: &[u8]) -> Option<Format> {
        bytes.first().copied().and_then(Format::from_tag)
    }

    fn tagged(format: Format, payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + payload.len());
        buf.put_u8(format as u8);
        buf.put_slice(payload);
        buf.freeze()
    }
}

/// Serializer that emits nothing and fails on the first non-finite float.
///
/// Used to decide the encode branch: JSON has no representation for NaN or
/// the infinities, and `serde_json` writes `null` for them without erroring.
struct FiniteCheck;

#[derive(Debug)]
struct NonFiniteFloat;

impl std::fmt::Display for NonFiniteFloat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("non-finite float")
    }
}

impl std::error::Error for NonFiniteFloat {}

impl serde::ser::Error for NonFiniteFloat {
    fn custom<T: std::fmt::Display>(_msg: T) -> Self {
        NonFiniteFloat
    }
}

impl serde::Serializer for FiniteCheck {
    type Ok = ();
    type Error = NonFiniteFloat;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_f32(self, v: f32) -> Result<(), NonFiniteFloat> {
        if v.is_finite() { Ok(()) } else { Err(NonFiniteFloat) }
    }

    fn serialize_f64(self, v: f64) -> Result<(), NonFiniteFloat> {
        if v.is_finite() { Ok(()) } else { Err(NonFiniteFloat) }
    }

    fn serialize_bool(self, _: bool) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_i8(self, _: i8) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_i16(self, _: i16) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_i32(self, _: i32) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_i64(self, _: i64) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_i128(self, _: i128) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_u8(self, _: u8) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_u16(self, _: u16) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_u32(self, _: u32) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_u64(self, _: u64) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_u128(self, _: u128) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_char(self, _: char) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_str(self, _: &str) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_bytes(self, _: &[u8]) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_none(self) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<(), NonFiniteFloat> {
        value.serialize(FiniteCheck)
    }

    fn serialize_unit(self) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
    ) -> Result<(), NonFiniteFloat> {
        Ok(())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        value: &T,
    ) -> Result<(), NonFiniteFloat> {
        value.serialize(FiniteCheck)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> Result<(), NonFiniteFloat> {
        value.serialize(FiniteCheck)
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Self, NonFiniteFloat> {
        Ok(FiniteCheck)
    }

    fn serialize_tuple(self, _: usize) -> Result<Self, NonFiniteFloat> {
        Ok(FiniteCheck)
    }

    fn serialize_tuple_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> Result<Self, NonFiniteFloat> {
        Ok(FiniteCheck)
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self, NonFiniteFloat> {
        Ok(FiniteCheck)
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self, NonFiniteFloat> {
        Ok(FiniteCheck)
    }

    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self, NonFiniteFloat> {
        Ok(FiniteCheck)
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self, NonFiniteFloat> {
        Ok(FiniteCheck)
    }
}

impl serde::ser::SerializeSeq for FiniteCheck {
    type Ok = ();
    type Error = NonFiniteFloat;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), NonFiniteFloat> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), NonFiniteFloat> {
        Ok(())
    }
}

impl serde::ser::SerializeTuple for FiniteCheck {
    type Ok = ();
    type Error = NonFiniteFloat;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), NonFiniteFloat> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), NonFiniteFloat> {
        Ok(())
    }
}

impl serde::ser::SerializeTupleStruct for FiniteCheck {
    type Ok = ();
    type Error = NonFiniteFloat;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), NonFiniteFloat> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), NonFiniteFloat> {
        Ok(())
    }
}

impl serde::ser::SerializeTupleVariant for FiniteCheck {
    type Ok = ();
    type Error = NonFiniteFloat;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), NonFiniteFloat> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), NonFiniteFloat> {
        Ok(())
    }
}

impl serde::ser::SerializeMap for FiniteCheck {
    type Ok = ();
    type Error = NonFiniteFloat;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), NonFiniteFloat> {
        key.serialize(FiniteCheck)
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), NonFiniteFloat> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), NonFiniteFloat> {
        Ok(())
    }
}

impl serde::ser::SerializeStruct for FiniteCheck {
    type Ok = ();
    type Error = NonFiniteFloat;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _: &'static str,
        value: &T,
    ) -> Result<(), NonFiniteFloat> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), NonFiniteFloat> {
        Ok(())
    }
}

impl serde::ser::SerializeStructVariant for FiniteCheck {
    type Ok = ();
    type Error = NonFiniteFloat;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _: &'static str,
        value: &T,
    ) -> Result<(), NonFiniteFloat> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), NonFiniteFloat> {
        Ok(())
    }
}
