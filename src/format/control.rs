// Control entries: the (diff, extra, seek) triplets of a bsdiff patch.

use super::int64::{self, INT64_LEN};
use crate::error::{PatchError, Result};

/// Encoded width of one control entry (three int64 fields).
pub const CONTROL_ENTRY_LEN: usize = 3 * INT64_LEN;

/// One instruction of a patch: copy `diff_size` delta-patched bytes, then
/// `extra_size` literal bytes, then move the old-buffer cursor by
/// `offset_increment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlEntry {
    /// The number of bytes to copy from the source and diff stream.
    pub diff_size: u64,
    /// The number of bytes to copy from the extra stream.
    pub extra_size: u64,
    /// The value to add to the source position after the diff run.
    pub offset_increment: i64,
}

impl ControlEntry {
    pub fn new(diff_size: u64, extra_size: u64, offset_increment: i64) -> Self {
        Self {
            diff_size,
            extra_size,
            offset_increment,
        }
    }

    /// Bytes of new data this entry produces.
    ///
    /// Returns `None` if the sum overflows `u64`.
    pub fn output_len(&self) -> Option<u64> {
        self.diff_size.checked_add(self.extra_size)
    }

    /// Encode to the 24-byte wire form.
    pub fn encode(&self) -> Result<[u8; CONTROL_ENTRY_LEN]> {
        let mut buf = [0u8; CONTROL_ENTRY_LEN];
        buf[..8].copy_from_slice(&int64::encode_size(self.diff_size)?);
        buf[8..16].copy_from_slice(&int64::encode_size(self.extra_size)?);
        buf[16..].copy_from_slice(&int64::encode(self.offset_increment)?);
        Ok(buf)
    }

    /// Decode from the 24-byte wire form. Negative sizes are corruption.
    pub fn decode(buf: &[u8; CONTROL_ENTRY_LEN]) -> Result<Self> {
        let field = |i: usize| {
            let mut b = [0u8; INT64_LEN];
            b.copy_from_slice(&buf[i * INT64_LEN..(i + 1) * INT64_LEN]);
            int64::decode(&b)
        };
        let diff_size = field(0);
        let extra_size = field(1);
        if diff_size < 0 || extra_size < 0 {
            return Err(PatchError::format(format!(
                "negative control sizes: diff_size {diff_size}, extra_size {extra_size}"
            )));
        }
        Ok(Self {
            diff_size: diff_size as u64,
            extra_size: extra_size as u64,
            offset_increment: field(2),
        })
    }
}
