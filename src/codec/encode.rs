//! Versioned encoder for the framed wire format.

use bytes::{BufMut, Bytes, BytesMut};

use super::WireVersion;
use super::error::CodecError;
use super::value::{Field, TYPE_INT, TYPE_OBJECT, TYPE_STR, Value};

/// Encode a message body (its ordered fields) under the given wire version.
///
/// The returned buffer is the complete framed message: header (version,
/// field count, total length) followed by the encoded fields. The total
/// length counts every byte of the message including the header itself.
pub(crate) fn encode_message(fields: &[Field], version: WireVersion) -> Result<Bytes, CodecError> {
    if fields.len() > 255 {
        return Err(CodecError::TooManyFields);
    }

    let mut body = BytesMut::new();
    for field in fields {
        encode_field(&mut body, field, version)?;
    }

    // version byte + field-count byte + length field + body
    let header_len = 2 + version.length_width();
    let total = header_len + body.len();
    if total as u64 > version.length_cap() {
        return Err(CodecError::MessageTooLarge {
            version: version.number(),
            cap: version.length_cap(),
        });
    }

    let mut out = BytesMut::with_capacity(total);
    out.put_u8(version.number());
    out.put_u8(fields.len() as u8);
    match version {
        WireVersion::V1 => out.put_u16(total as u16),
        WireVersion::V2 => out.put_u32(total as u32),
    }
    out.extend_from_slice(&body);
    Ok(out.freeze())
}

fn encode_field(buf: &mut BytesMut, field: &Field, version: WireVersion) -> Result<(), CodecError> {
    let name = field.name.as_bytes();
    if name.is_empty() || name.len() > 255 {
        return Err(CodecError::InvalidFieldName(name.len()));
    }
    buf.put_u8(name.len() as u8);
    buf.put_slice(name);
    buf.put_u8(field.value.type_code());
    encode_value(buf, &field.value, version)
}

fn encode_value(buf: &mut BytesMut, value: &Value, version: WireVersion) -> Result<(), CodecError> {
    match value {
        Value::Int(v) => {
            buf.put_i64(*v);
            Ok(())
        }
        Value::Str(s) => {
            put_length(buf, s.len(), version)?;
            buf.put_slice(s.as_bytes());
            Ok(())
        }
        Value::List(items) => {
            let element_type = items.first().map_or(TYPE_INT, Value::type_code);
            if !matches!(element_type, TYPE_INT | TYPE_STR | TYPE_OBJECT) {
                return Err(CodecError::UnsupportedListElement(element_type));
            }
            buf.put_u8(element_type);
            put_length(buf, items.len(), version)?;
            for item in items {
                if item.type_code() != element_type {
                    return Err(CodecError::MixedListElements);
                }
                encode_value(buf, item, version)?;
            }
            Ok(())
        }
        Value::Object(fields) => {
            if fields.len() > 255 {
                return Err(CodecError::TooManyFields);
            }
            buf.put_u8(fields.len() as u8);
            for field in fields {
                encode_field(buf, field, version)?;
            }
            Ok(())
        }
        Value::Bytes(data) => {
            if version == WireVersion::V1 {
                return Err(CodecError::BytesRequiresV2);
            }
            if data.len() as u64 > u32::MAX as u64 {
                return Err(CodecError::ValueTooLarge {
                    version: version.number(),
                    len: data.len(),
                    cap: u32::MAX as u64,
                });
            }
            buf.put_u32(data.len() as u32);
            buf.put_slice(data);
            Ok(())
        }
    }
}

/// Write a string length or list element count using the version's width.
fn put_length(buf: &mut BytesMut, len: usize, version: WireVersion) -> Result<(), CodecError> {
    match version {
        WireVersion::V1 => {
            if len > u16::MAX as usize {
                return Err(CodecError::ValueTooLarge {
                    version: 1,
                    len,
                    cap: u16::MAX as u64,
                });
            }
            buf.put_u16(len as u16);
        }
        WireVersion::V2 => {
            if len as u64 > u32::MAX as u64 {
                return Err(CodecError::ValueTooLarge {
                    version: 2,
                    len,
                    cap: u32::MAX as u64,
                });
            }
            buf.put_u32(len as u32);
        }
    }
    Ok(())
}
