// Patch header encoding/decoding.
//
// Two layouts share the same 32-byte frame:
//
//   offset  size  BSDIFF40                BSDF2
//   0       8     "BSDIFF40"              "BSDF2" + 3 compressor ids
//   8       8     compressed ctrl length  (same)
//   16      8     compressed diff length  (same)
//   24      8     new file size           (same)
//
// BSDIFF40 carries no algorithm identifier and always means BZ2 on all
// three streams. BSDF2 names the backend of each stream explicitly.

use super::int64;
use crate::compress::CompressorType;
use crate::error::{PatchError, Result};

/// Size of the fixed patch header.
pub const HEADER_LEN: usize = 32;

/// Magic of the legacy format.
pub const LEGACY_MAGIC: &[u8; 8] = b"BSDIFF40";

/// Magic prefix of the format with explicit compressor ids.
pub const BSDF2_MAGIC: &[u8; 5] = b"BSDF2";

/// On-disk patch format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatchFormat {
    /// Upstream "BSDIFF40": BZ2 streams, no backend field.
    #[default]
    Legacy,
    /// "BSDF2": one compressor id per stream in the header.
    Bsdf2,
}

impl PatchFormat {
    /// Whether `compressor` can be expressed by this format.
    pub fn supports(self, compressor: CompressorType) -> bool {
        match self {
            Self::Legacy => compressor == CompressorType::Bz2,
            Self::Bsdf2 => true,
        }
    }
}

impl std::fmt::Display for PatchFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Legacy => write!(f, "BSDIFF40"),
            Self::Bsdf2 => write!(f, "BSDF2"),
        }
    }
}

// ---------------------------------------------------------------------------
// PatchHeader
// ---------------------------------------------------------------------------

/// Parsed patch header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchHeader {
    pub format: PatchFormat,
    /// Backends of the control, diff and extra streams, in that order.
    pub compressors: [CompressorType; 3],
    /// Length of the compressed control block.
    pub ctrl_len: u64,
    /// Length of the compressed diff block.
    pub diff_len: u64,
    /// Size of the reconstructed new buffer.
    pub new_size: u64,
}

impl PatchHeader {
    /// Encode to the 32-byte wire form.
    ///
    /// Fails if the format cannot express the stream backends.
    pub fn encode(&self) -> Result<[u8; HEADER_LEN]> {
        let mut out = [0u8; HEADER_LEN];
        match self.format {
            PatchFormat::Legacy => {
                if self.compressors.iter().any(|&c| c != CompressorType::Bz2) {
                    return Err(PatchError::Unsupported(
                        "BSDIFF40 patches must use BZ2 for every stream".into(),
                    ));
                }
                out[..8].copy_from_slice(LEGACY_MAGIC);
            }
            PatchFormat::Bsdf2 => {
                out[..5].copy_from_slice(BSDF2_MAGIC);
                for (slot, c) in out[5..8].iter_mut().zip(self.compressors) {
                    *slot = c.id();
                }
            }
        }
        out[8..16].copy_from_slice(&int64::encode_size(self.ctrl_len)?);
        out[16..24].copy_from_slice(&int64::encode_size(self.diff_len)?);
        out[24..32].copy_from_slice(&int64::encode_size(self.new_size)?);
        Ok(out)
    }

    /// Parse and validate the header of a complete patch.
    ///
    /// Checks the magic, that every length field is non-negative, and that
    /// the control and diff blocks fit inside `patch`.
    pub fn parse(patch: &[u8]) -> Result<Self> {
        if patch.len() < HEADER_LEN {
            return Err(PatchError::format(format!(
                "patch is {} bytes, shorter than the {HEADER_LEN}-byte header",
                patch.len()
            )));
        }

        let (format, compressors) = if &patch[..8] == LEGACY_MAGIC {
            (PatchFormat::Legacy, [CompressorType::Bz2; 3])
        } else if &patch[..5] == BSDF2_MAGIC {
            let mut compressors = [CompressorType::None; 3];
            for (slot, &id) in compressors.iter_mut().zip(&patch[5..8]) {
                *slot = CompressorType::from_id(id).ok_or_else(|| {
                    PatchError::format(format!("unknown compressor id {id} in header"))
                })?;
            }
            (PatchFormat::Bsdf2, compressors)
        } else {
            return Err(PatchError::format("not a bsdiff patch (bad magic)"));
        };

        let field = |at: usize| int64::decode_slice(&patch[at..]).unwrap_or(-1);
        let ctrl_len = field(8);
        let diff_len = field(16);
        let new_size = field(24);

        let fits = |ctrl: i64, diff: i64| {
            (HEADER_LEN as u64)
                .checked_add(ctrl as u64)
                .and_then(|n| n.checked_add(diff as u64))
                .is_some_and(|end| end <= patch.len() as u64)
        };
        if ctrl_len < 0 || diff_len < 0 || new_size < 0 || !fits(ctrl_len, diff_len) {
            return Err(PatchError::format(format!(
                "ctrl_len: {ctrl_len}, diff_len: {diff_len}, new_size: {new_size}, \
                 patch_size: {}",
                patch.len()
            )));
        }

        Ok(Self {
            format,
            compressors,
            ctrl_len: ctrl_len as u64,
            diff_len: diff_len as u64,
            new_size: new_size as u64,
        })
    }

    /// Byte ranges of the control, diff and extra blocks within the patch.
    pub fn stream_ranges(&self, patch_len: usize) -> [std::ops::Range<usize>; 3] {
        let ctrl_start = HEADER_LEN;
        let diff_start = ctrl_start + self.ctrl_len as usize;
        let extra_start = diff_start + self.diff_len as usize;
        [
            ctrl_start..diff_start,
            diff_start..extra_start,
            extra_start..patch_len,
        ]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
