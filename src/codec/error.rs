//! Wire codec error types.

use thiserror::Error;

/// Errors produced while encoding or decoding framed messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The version byte is neither 1 nor 2.
    #[error("unsupported wire version {0}")]
    UnsupportedVersion(u8),

    /// A type code outside the defined set was encountered.
    #[error("unknown type code {0:#04x}")]
    UnknownTypeCode(u8),

    /// The header's total-length field disagrees with the buffer length.
    #[error("declared length {declared} does not match buffer length {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Bytes remain after the final declared field was consumed.
    #[error("trailing bytes after declared message end")]
    TrailingBytes,

    /// A length prefix points past the end of the buffer.
    #[error("truncated message: needed {needed} more bytes")]
    Truncated { needed: usize },

    /// Field names must be 1..=255 bytes of UTF-8.
    #[error("field name must be 1..=255 bytes, got {0}")]
    InvalidFieldName(usize),

    /// A name or string value is not valid UTF-8.
    #[error("invalid utf-8 in {context}")]
    InvalidUtf8 { context: &'static str },

    /// The encoded message would exceed the version's total-length cap.
    #[error("message exceeds version {version} length cap of {cap} bytes")]
    MessageTooLarge { version: u8, cap: u64 },

    /// A string or list length does not fit the version's length prefix.
    #[error("value of length {len} exceeds version {version} cap of {cap}")]
    ValueTooLarge { version: u8, len: usize, cap: u64 },

    /// List elements must all share the element type declared up front.
    #[error("list elements must share one type")]
    MixedListElements,

    /// Lists may only hold ints, strings or objects.
    #[error("unsupported list element type {0:#04x}")]
    UnsupportedListElement(u8),

    /// The bytes type is only defined for wire version 2.
    #[error("bytes values require wire version 2")]
    BytesRequiresV2,

    /// Messages and objects carry at most 255 fields.
    #[error("message cannot carry more than 255 fields")]
    TooManyFields,
}
