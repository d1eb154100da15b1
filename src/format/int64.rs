// bsdiff 64-bit integer codec.
//
// Sign-magnitude, little-endian: the magnitude occupies the low 63 bits
// of eight bytes and bit 7 of the last byte is the sign. This is not
// two's complement. Zero is all-zero bytes.

use crate::error::{PatchError, Result};

/// Encoded width of one integer.
pub const INT64_LEN: usize = 8;

/// Largest encodable magnitude (2^63 - 1).
pub const MAX_MAGNITUDE: u64 = i64::MAX as u64;

const SIGN_BIT: u8 = 0x80;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode a signed value into `buf`.
///
/// `i64::MIN` has no sign-magnitude representation and is rejected.
pub fn encode_into(value: i64, buf: &mut [u8; INT64_LEN]) -> Result<()> {
    if value == i64::MIN {
        return Err(PatchError::range(
            "i64::MIN is not representable in sign-magnitude form",
        ));
    }
    let magnitude = value.unsigned_abs();
    *buf = magnitude.to_le_bytes();
    if value < 0 {
        buf[INT64_LEN - 1] |= SIGN_BIT;
    }
    Ok(())
}

/// Encode a signed value, returning the eight wire bytes.
pub fn encode(value: i64) -> Result<[u8; INT64_LEN]> {
    let mut buf = [0u8; INT64_LEN];
    encode_into(value, &mut buf)?;
    Ok(buf)
}

/// Encode an unsigned size. Sizes above [`MAX_MAGNITUDE`] are rejected.
pub fn encode_size(value: u64) -> Result<[u8; INT64_LEN]> {
    let signed = i64::try_from(value).map_err(|_| {
        PatchError::range(format!(
            "size {value} exceeds the maximum encodable magnitude {MAX_MAGNITUDE}"
        ))
    })?;
    encode(signed)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode eight wire bytes. Bit 63 is the sign; it never contributes to
/// the magnitude.
#[inline]
pub fn decode(buf: &[u8; INT64_LEN]) -> i64 {
    let mut bytes = *buf;
    let negative = bytes[INT64_LEN - 1] & SIGN_BIT != 0;
    bytes[INT64_LEN - 1] &= !SIGN_BIT;
    // Magnitude is at most 2^63 - 1, so the cast cannot wrap.
    let magnitude = u64::from_le_bytes(bytes) as i64;
    if negative { -magnitude } else { magnitude }
}

/// Decode from the first eight bytes of `data`, if present.
pub fn decode_slice(data: &[u8]) -> Option<i64> {
    let head: &[u8; INT64_LEN] = data.get(..INT64_LEN)?.try_into().ok()?;
    Some(decode(head))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
