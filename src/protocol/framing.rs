//! RPC frame alignment

use bytes::BufMut;

/// Padding appended after a body of `body_length` bytes
///
/// Always between 4 and 7 bytes: the framed length is rounded up to a
/// multiple of 4, and an already aligned body still gets 4 bytes.
#[must_use]
pub const fn padding(body_length: u32) -> u32 {
    4 + ((4 - body_length % 4) % 4)
}

/// Append the zero padding for the current body length
pub fn pad_body(body: &mut Vec<u8>) {
    // only the low two bits of the length matter
    let pad = padding((body.len() % 4) as u32);
    body.put_bytes(0, pad as usize);
}
