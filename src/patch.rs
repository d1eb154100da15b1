// Patch application.
//
// Replays the control entries of a patch against the old buffer: each
// entry adds `diff_size` delta bytes to the old bytes at the current old
// position, copies `extra_size` literal bytes, then moves the old
// position. Every entry is bounds-checked before anything is read.

use std::io::Write;

use crate::error::{PatchError, Result};
use crate::format::{ControlEntry, PatchHeader};
use crate::reader::BsdiffPatchReader;

/// Delta and literal bytes are staged through a buffer of this size.
const APPLY_CHUNK: usize = 64 * 1024;

/// Never pre-allocate more than this for the output, whatever the header
/// claims.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

/// Apply `patch` to `old` and return the reconstructed new buffer.
pub fn apply(old: &[u8], patch: &[u8]) -> Result<Vec<u8>> {
    let declared = PatchHeader::parse(patch)?.new_size;
    let mut out = Vec::with_capacity(declared.min(MAX_PREALLOC) as usize);
    apply_to(old, patch, &mut out)?;
    Ok(out)
}

/// Apply `patch` to `old`, streaming the new data into `sink`.
///
/// Returns the number of bytes written. On failure `sink` may hold a
/// prefix of the output.
pub fn apply_to<W: Write + ?Sized>(old: &[u8], patch: &[u8], sink: &mut W) -> Result<u64> {
    let mut reader = BsdiffPatchReader::new(patch)?;
    let new_size = reader.new_file_size();

    let mut old_pos: i64 = 0;
    let mut new_pos: u64 = 0;
    let mut buf = Vec::new();

    while new_pos < new_size {
        let entry = reader.parse_control_entry()?;
        let end = check_entry(&entry, old.len(), old_pos, new_pos, new_size)?;

        let mut remaining = entry.diff_size as usize;
        let mut src = old_pos as usize;
        while remaining > 0 {
            let n = remaining.min(APPLY_CHUNK);
            buf.resize(n, 0);
            reader.read_diff_stream(&mut buf)?;
            for (b, o) in buf.iter_mut().zip(&old[src..src + n]) {
                *b = b.wrapping_add(*o);
            }
            sink.write_all(&buf)?;
            src += n;
            remaining -= n;
        }

        let mut remaining = entry.extra_size as usize;
        while remaining > 0 {
            let n = remaining.min(APPLY_CHUNK);
            buf.resize(n, 0);
            reader.read_extra_stream(&mut buf)?;
            sink.write_all(&buf)?;
            remaining -= n;
        }

        old_pos = old_pos
            .checked_add(entry.diff_size as i64)
            .and_then(|p| p.checked_add(entry.offset_increment))
            .ok_or_else(|| {
                PatchError::range(format!(
                    "old position overflow at new offset {new_pos}: offset_increment {}",
                    entry.offset_increment
                ))
            })?;
        new_pos = end;
    }

    reader.finish()?;
    sink.flush()?;
    Ok(new_pos)
}

/// Validate one entry against the buffers. Returns the new position after
/// the entry.
fn check_entry(
    entry: &ControlEntry,
    old_len: usize,
    old_pos: i64,
    new_pos: u64,
    new_size: u64,
) -> Result<u64> {
    let end = entry
        .output_len()
        .and_then(|n| n.checked_add(new_pos))
        .filter(|&end| end <= new_size)
        .ok_or_else(|| {
            log::error!("control entry overruns the declared new size {new_size}");
            PatchError::range(format!(
                "control entry at new offset {new_pos} (diff_size {}, extra_size {}) \
                 exceeds new size {new_size}",
                entry.diff_size, entry.extra_size
            ))
        })?;

    let old_len = old_len as u64;
    if entry.diff_size > 0
        && (old_pos < 0
            || old_pos as u64 >= old_len
            || entry.diff_size > old_len - old_pos as u64)
    {
        log::error!("control entry reads outside the old buffer");
        return Err(PatchError::range(format!(
            "control entry reads old data out of bounds: old_pos {old_pos}, diff_size {}, \
             old_size {old_len}",
            entry.diff_size
        )));
    }
    Ok(end)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
