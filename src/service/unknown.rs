//! Reply for unsupported protocol versions

use bytes::BufMut;

use crate::protocol::ErrorCode;

/// Size of the unknown-version reply
pub const RESPONSE_SIZE: usize = 12;

/// Fixed reply telling the client its KMS id does not match
///
/// Two zero words followed by `SL_E_VL_KEY_MANAGEMENT_SERVICE_ID_MISMATCH`,
/// all little-endian. Nothing from the request is consulted.
#[must_use]
pub fn respond() -> [u8; RESPONSE_SIZE] {
    let mut out = [0u8; RESPONSE_SIZE];
    let mut buf = &mut out[..];
    buf.put_u32_le(0);
    buf.put_u32_le(0);
    buf.put_u32_le(ErrorCode::KeyManagementServiceIdMismatch.as_u32());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_bytes() {
        assert_eq!(
            respond(),
            [0, 0, 0, 0, 0, 0, 0, 0, 0x42, 0xF0, 0x04, 0xC0]
        );
    }
}
