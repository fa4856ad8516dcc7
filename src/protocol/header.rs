//! Generic KMS request header
//!
//! Only the version fields are parsed; the body stays opaque until the
//! version-specific handler takes over.

use bytes::{Buf, Bytes};

use super::{Error, Result};

/// Generic request header
///
/// # Wire Format
///
/// ```text
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                       Body Length 1 (4)                       |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                       Body Length 2 (4)                       |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |       Version Minor (2)       |       Version Major (2)       |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                        Remainder ...                          |
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericHeader {
    body_length1: u32,
    body_length2: u32,
    version_minor: u16,
    version_major: u16,
    remainder: Bytes,
}

impl GenericHeader {
    /// Bytes consumed by the parsed fields
    pub const SIZE: usize = 12;

    /// Parse the header from the start of a raw message
    ///
    /// Any version number is accepted; deciding what to do with it is the
    /// dispatcher's job.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(Error::Truncated {
                field: "header",
                needed: Self::SIZE,
                available: bytes.len(),
            });
        }

        let mut buf = bytes;
        Ok(Self {
            body_length1: buf.get_u32_le(),
            body_length2: buf.get_u32_le(),
            version_minor: buf.get_u16_le(),
            version_major: buf.get_u16_le(),
            remainder: Bytes::copy_from_slice(buf),
        })
    }

    /// First body length word
    #[must_use]
    pub const fn body_length1(&self) -> u32 {
        self.body_length1
    }

    /// Second body length word
    #[must_use]
    pub const fn body_length2(&self) -> u32 {
        self.body_length2
    }

    /// Minor protocol version
    #[must_use]
    pub const fn version_minor(&self) -> u16 {
        self.version_minor
    }

    /// Major protocol version
    #[must_use]
    pub const fn version_major(&self) -> u16 {
        self.version_major
    }

    /// Unparsed bytes after the version fields
    #[must_use]
    pub const fn remainder(&self) -> &Bytes {
        &self.remainder
    }
}
