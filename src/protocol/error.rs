//! KMS wire format errors

use thiserror::Error;

/// Errors raised while encoding or decoding KMS records
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Fewer bytes remain than the field needs
    #[error("truncated field `{field}`: need {needed} bytes, got {available}")]
    Truncated {
        /// Field being decoded
        field: &'static str,
        /// Bytes required by the field
        needed: usize,
        /// Bytes left in the buffer
        available: usize,
    },

    /// A length field declares a size that cannot be satisfied
    #[error("field `{field}` declares length {declared}, valid range is {min}..={max}")]
    LengthOutOfRange {
        /// Field whose length was declared
        field: &'static str,
        /// Declared length
        declared: u64,
        /// Smallest acceptable length
        min: u64,
        /// Largest acceptable length
        max: u64,
    },

    /// Variable-length text whose size cannot be derived from context
    #[error("cannot determine length of `{field}`: `{length_field}` was not decoded before it")]
    UndeterminedLength {
        /// Text field
        field: &'static str,
        /// Length field it depends on
        length_field: &'static str,
    },

    /// UTF-16 text with an odd byte count
    #[error("text field `{field}` has odd byte length {len}")]
    OddTextLength {
        /// Text field
        field: &'static str,
        /// Byte length found
        len: usize,
    },

    /// Text that is not valid UTF-16
    #[error("text field `{field}` is not valid UTF-16")]
    InvalidUtf16 {
        /// Text field
        field: &'static str,
    },

    /// Text too long for its fixed region
    #[error("text field `{field}` is {len} bytes, region holds {max}")]
    TextTooLong {
        /// Text field
        field: &'static str,
        /// Encoded byte length
        len: usize,
        /// Region size
        max: usize,
    },

    /// Text for a zero-padded region contains a NUL code unit
    #[error("text field `{field}` contains an embedded NUL")]
    EmbeddedNul {
        /// Text field
        field: &'static str,
    },

    /// Bytes left over after a complete record
    #[error("{extra} trailing bytes after `{layout}` record")]
    TrailingBytes {
        /// Layout name
        layout: &'static str,
        /// Unconsumed byte count
        extra: usize,
    },

    /// Field name not present in the layout
    #[error("layout `{layout}` has no field `{field}`")]
    UnknownField {
        /// Layout name
        layout: &'static str,
        /// Field name
        field: &'static str,
    },

    /// Record has no value for a field the layout requires
    #[error("record `{layout}` has no value for `{field}`")]
    MissingField {
        /// Layout name
        layout: &'static str,
        /// Field name
        field: &'static str,
    },

    /// Record value does not match the field kind
    #[error("field `{field}` expects {expected}")]
    FieldType {
        /// Field name
        field: &'static str,
        /// Expected value kind
        expected: &'static str,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
