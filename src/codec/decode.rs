//! Versioned decoder for the framed wire format.
//!
//! The decoder is strict: unknown versions and type codes, header lengths
//! that disagree with the buffer, reads past the end of the buffer, and
//! bytes left over after the declared fields all fail decoding.

use super::WireVersion;
use super::error::CodecError;
use super::value::{Field, TYPE_BYTES, TYPE_INT, TYPE_LIST, TYPE_OBJECT, TYPE_STR, Value};

/// Cursor over the raw message buffer with checked reads.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let remaining = self.buf.len() - self.pos;
        if n > remaining {
            return Err(CodecError::Truncated {
                needed: n - remaining,
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i64(&mut self) -> Result<i64, CodecError> {
        let b = self.take(8)?;
        Ok(i64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Read a string length or list count using the version's width.
    fn length(&mut self, version: WireVersion) -> Result<usize, CodecError> {
        match version {
            WireVersion::V1 => Ok(self.u16()? as usize),
            WireVersion::V2 => Ok(self.u32()? as usize),
        }
    }
}

/// Decode a complete framed message buffer.
pub(crate) fn decode_message(buf: &[u8]) -> Result<(WireVersion, Vec<Field>), CodecError> {
    let mut r = Reader::new(buf);

    let version = match r.u8()? {
        1 => WireVersion::V1,
        2 => WireVersion::V2,
        other => return Err(CodecError::UnsupportedVersion(other)),
    };
    let field_count = r.u8()?;
    let declared = match version {
        WireVersion::V1 => r.u16()? as usize,
        WireVersion::V2 => r.u32()? as usize,
    };
    if declared != buf.len() {
        return Err(CodecError::LengthMismatch {
            declared,
            actual: buf.len(),
        });
    }

    let mut fields = Vec::with_capacity(field_count as usize);
    for _ in 0..field_count {
        fields.push(decode_field(&mut r, version)?);
    }
    if r.pos != buf.len() {
        return Err(CodecError::TrailingBytes);
    }
    Ok((version, fields))
}

fn decode_field(r: &mut Reader<'_>, version: WireVersion) -> Result<Field, CodecError> {
    let name_len = r.u8()? as usize;
    if name_len == 0 {
        return Err(CodecError::InvalidFieldName(0));
    }
    let name = std::str::from_utf8(r.take(name_len)?)
        .map_err(|_| CodecError::InvalidUtf8 {
            context: "field name",
        })?
        .to_string();
    let type_code = r.u8()?;
    let value = decode_value(r, type_code, version)?;
    Ok(Field { name, value })
}

fn decode_value(
    r: &mut Reader<'_>,
    type_code: u8,
    version: WireVersion,
) -> Result<Value, CodecError> {
    match type_code {
        TYPE_INT => Ok(Value::Int(r.i64()?)),
        TYPE_STR => {
            let len = r.length(version)?;
            let s = std::str::from_utf8(r.take(len)?)
                .map_err(|_| CodecError::InvalidUtf8 {
                    context: "string value",
                })?
                .to_string();
            Ok(Value::Str(s))
        }
        TYPE_LIST => {
            let element_type = r.u8()?;
            if !matches!(element_type, TYPE_INT | TYPE_STR | TYPE_OBJECT) {
                return Err(CodecError::UnsupportedListElement(element_type));
            }
            let count = r.length(version)?;
            let mut items = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                items.push(decode_value(r, element_type, version)?);
            }
            Ok(Value::List(items))
        }
        TYPE_OBJECT => {
            let field_count = r.u8()? as usize;
            let mut fields = Vec::with_capacity(field_count);
            for _ in 0..field_count {
                fields.push(decode_field(r, version)?);
            }
            Ok(Value::Object(fields))
        }
        TYPE_BYTES => {
            if version == WireVersion::V1 {
                return Err(CodecError::BytesRequiresV2);
            }
            let len = r.u32()? as usize;
            Ok(Value::Bytes(r.take(len)?.to_vec()))
        }
        other => Err(CodecError::UnknownTypeCode(other)),
    }
}
