//! Self-describing binary wire format used on every request and response.
//!
//! A message is a fixed header (version, field count, total length) followed
//! by named, typed fields. Two interoperable versions exist: v1 uses 16-bit
//! length prefixes and caps messages at 65,535 bytes; v2 uses 32-bit prefixes
//! and adds the raw-bytes type. The server emits v2 and accepts either
//! version inbound.
//!
//! Round-trip law: `decode(encode(m, v)) == m` for every message whose values
//! are expressible under version `v`.

mod decode;
mod encode;
mod error;
mod value;

pub use error::CodecError;
pub use value::{Field, Value};

use bytes::Bytes;

/// Wire content type for framed request and response bodies.
pub const CONTENT_TYPE: &str = "application/x-galacticbuf";

/// The two wire format versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireVersion {
    /// 16-bit length prefixes, 65,535-byte message cap.
    V1,
    /// 32-bit length prefixes, adds the bytes type. Server default.
    V2,
}

impl WireVersion {
    /// The version byte written at the start of every message.
    pub fn number(self) -> u8 {
        match self {
            WireVersion::V1 => 1,
            WireVersion::V2 => 2,
        }
    }

    /// Maximum total message length for this version.
    pub fn length_cap(self) -> u64 {
        match self {
            WireVersion::V1 => u16::MAX as u64,
            WireVersion::V2 => u32::MAX as u64,
        }
    }

    /// Width in bytes of the header's total-length field.
    pub(crate) fn length_width(self) -> usize {
        match self {
            WireVersion::V1 => 2,
            WireVersion::V2 => 4,
        }
    }
}

/// An ordered collection of named fields: one wire message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    fields: Vec<Field>,
}

impl Message {
    /// An empty message.
    pub fn new() -> Self {
        Message { fields: Vec::new() }
    }

    /// Build a message directly from fields.
    pub fn from_fields(fields: Vec<Field>) -> Self {
        Message { fields }
    }

    /// Append a field, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push(Field::new(name, value));
        self
    }

    /// Append an integer field, builder style.
    pub fn with_int(self, name: impl Into<String>, value: i64) -> Self {
        self.with(name, Value::Int(value))
    }

    /// Append a string field, builder style.
    pub fn with_str(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(name, Value::Str(value.into()))
    }

    /// Append a list field, builder style.
    pub fn with_list(self, name: impl Into<String>, items: Vec<Value>) -> Self {
        self.with(name, Value::List(items))
    }

    /// The ordered fields of this message.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field's value by name (first match wins).
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.value)
    }

    /// Integer field accessor.
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    /// String field accessor.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// List field accessor.
    pub fn get_list(&self, name: &str) -> Option<&[Value]> {
        self.get(name).and_then(Value::as_list)
    }

    /// Encode this message under the given wire version.
    pub fn encode(&self, version: WireVersion) -> Result<Bytes, CodecError> {
        encode::encode_message(&self.fields, version)
    }

    /// Decode a complete framed buffer, returning the wire version it used.
    pub fn decode(buf: &[u8]) -> Result<(WireVersion, Message), CodecError> {
        let (version, fields) = decode::decode_message(buf)?;
        Ok((version, Message { fields }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(message: &Message, version: WireVersion) -> Message {
        let encoded = message.encode(version).expect("encode failed");
        let (decoded_version, decoded) = Message::decode(&encoded).expect("decode failed");
        assert_eq!(decoded_version, version);
        decoded
    }

    #[test]
    fn test_empty_message_roundtrip() {
        let m = Message::new();
        assert_eq!(roundtrip(&m, WireVersion::V1), m);
        assert_eq!(roundtrip(&m, WireVersion::V2), m);
    }

    #[test]
    fn test_scalar_fields_roundtrip() {
        let m = Message::new()
            .with_int("price", -150)
            .with_int("quantity", i64::MAX)
            .with_str("status", "ACTIVE")
            .with_str("empty", "");
        assert_eq!(roundtrip(&m, WireVersion::V1), m);
        assert_eq!(roundtrip(&m, WireVersion::V2), m);
    }

    #[test]
    fn test_nested_structures_roundtrip() {
        let order = Value::Object(vec![
            Field::new("order_id", "f00d"),
            Field::new("price", 150i64),
        ]);
        let m = Message::new()
            .with_list("bids", vec![order.clone(), order])
            .with_list("empty", vec![])
            .with_list("prices", vec![Value::Int(1), Value::Int(-2), Value::Int(3)]);
        assert_eq!(roundtrip(&m, WireVersion::V1), m);
        assert_eq!(roundtrip(&m, WireVersion::V2), m);
    }

    #[test]
    fn test_bytes_is_v2_only() {
        let m = Message::new().with("blob", Value::Bytes(vec![0, 1, 2, 255]));
        assert_eq!(m.encode(WireVersion::V1), Err(CodecError::BytesRequiresV2));
        assert_eq!(roundtrip(&m, WireVersion::V2), m);
    }

    #[test]
    fn test_v1_message_decodes_under_shared_decoder() {
        // The decoder is version-dispatching, so a v1 frame decodes fine
        // even though the server emits v2.
        let m = Message::new().with_str("token", "abc").with_int("n", 7);
        let encoded = m.encode(WireVersion::V1).expect("encode failed");
        let (version, decoded) = Message::decode(&encoded).expect("decode failed");
        assert_eq!(version, WireVersion::V1);
        assert_eq!(decoded, m);
    }

    #[test]
    fn test_unknown_version_rejected() {
        let m = Message::new().with_int("n", 1);
        let mut encoded = m.encode(WireVersion::V2).expect("encode failed").to_vec();
        encoded[0] = 3;
        assert_eq!(
            Message::decode(&encoded),
            Err(CodecError::UnsupportedVersion(3))
        );
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let m = Message::new().with_int("n", 1);
        let mut encoded = m.encode(WireVersion::V2).expect("encode failed").to_vec();
        // Corrupt the declared total length.
        encoded[5] = encoded[5].wrapping_add(1);
        assert!(matches!(
            Message::decode(&encoded),
            Err(CodecError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        // Declare zero fields but leave payload behind the header.
        let m = Message::new().with_int("n", 1);
        let mut encoded = m.encode(WireVersion::V2).expect("encode failed").to_vec();
        encoded[1] = 0; // field_count = 0, length still covers the field bytes
        assert_eq!(Message::decode(&encoded), Err(CodecError::TrailingBytes));
    }

    #[test]
    fn test_truncated_value_rejected() {
        let m = Message::new().with_str("s", "hello");
        let encoded = m.encode(WireVersion::V2).expect("encode failed");
        // Slice off the last byte; header length no longer matches first.
        let cut = &encoded[..encoded.len() - 1];
        assert!(matches!(
            Message::decode(cut),
            Err(CodecError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_inner_length_overrun_rejected() {
        let m = Message::new().with_str("s", "hello");
        let mut encoded = m.encode(WireVersion::V2).expect("encode failed").to_vec();
        // Inflate the string's 32-bit length prefix so it overruns the buffer.
        // Layout: header(6) + name_len(1) + "s"(1) + type(1) => prefix at 9.
        encoded[9..13].copy_from_slice(&1000u32.to_be_bytes());
        assert!(matches!(
            Message::decode(&encoded),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_empty_field_name_rejected_on_encode() {
        let m = Message::new().with_int("", 1);
        assert_eq!(
            m.encode(WireVersion::V2),
            Err(CodecError::InvalidFieldName(0))
        );
    }

    #[test]
    fn test_mixed_list_rejected_on_encode() {
        let m = Message::new().with_list("xs", vec![Value::Int(1), Value::Str("two".into())]);
        assert_eq!(
            m.encode(WireVersion::V2),
            Err(CodecError::MixedListElements)
        );
    }

    #[test]
    fn test_list_of_lists_rejected_on_encode() {
        let m = Message::new().with_list("xs", vec![Value::List(vec![])]);
        assert!(matches!(
            m.encode(WireVersion::V2),
            Err(CodecError::UnsupportedListElement(_))
        ));
    }

    #[test]
    fn test_v1_string_cap_enforced() {
        let big = "x".repeat(70_000);
        let m = Message::new().with_str("s", big.clone());
        assert!(matches!(
            m.encode(WireVersion::V1),
            Err(CodecError::ValueTooLarge { version: 1, .. })
                | Err(CodecError::MessageTooLarge { version: 1, .. })
        ));
        // Fits comfortably under the v2 cap.
        assert_eq!(roundtrip(&m, WireVersion::V2).get_str("s"), Some(&big[..]));
    }

    #[test]
    fn test_unknown_type_code_rejected() {
        let m = Message::new().with_int("n", 1);
        let mut encoded = m.encode(WireVersion::V2).expect("encode failed").to_vec();
        // Type code sits after header(6) + name_len(1) + name(1).
        encoded[8] = 0x7f;
        assert_eq!(
            Message::decode(&encoded),
            Err(CodecError::UnknownTypeCode(0x7f))
        );
    }
}
