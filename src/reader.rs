// Patch reader.
//
// Validates the header, attaches one decompressor per block, then hands
// out control entries and diff/extra bytes on demand. The caller (usually
// `patch::apply`) drives how many bytes are pulled from each stream.

use crate::compress::{Decompressor, create_decompressor};
use crate::error::{PatchError, Result};
use crate::format::{CONTROL_ENTRY_LEN, ControlEntry, PatchHeader};

/// Reader over an in-memory BSDIFF40 or BSDF2 patch.
pub struct BsdiffPatchReader<'a> {
    header: PatchHeader,
    ctrl_stream: Box<dyn Decompressor + 'a>,
    diff_stream: Box<dyn Decompressor + 'a>,
    extra_stream: Box<dyn Decompressor + 'a>,
}

impl<'a> BsdiffPatchReader<'a> {
    /// Parse the header of `patch` and attach the stream decompressors.
    pub fn new(patch: &'a [u8]) -> Result<Self> {
        let header = PatchHeader::parse(patch).inspect_err(|e| {
            log::error!("rejecting patch of {} bytes: {e}", patch.len());
        })?;

        let [ctrl, diff, extra] = header.stream_ranges(patch.len());
        let [ctrl_kind, diff_kind, extra_kind] = header.compressors;
        let ctrl_stream = create_decompressor(ctrl_kind, &patch[ctrl])?;
        let diff_stream = create_decompressor(diff_kind, &patch[diff])?;
        let extra_stream = create_decompressor(extra_kind, &patch[extra])?;

        log::debug!(
            "{} patch: ctrl {} bytes, diff {} bytes, new size {}",
            header.format,
            header.ctrl_len,
            header.diff_len,
            header.new_size
        );

        Ok(Self {
            header,
            ctrl_stream,
            diff_stream,
            extra_stream,
        })
    }

    pub fn header(&self) -> &PatchHeader {
        &self.header
    }

    /// Declared size of the reconstructed new buffer.
    pub fn new_file_size(&self) -> u64 {
        self.header.new_size
    }

    /// Pull the next 24-byte control entry.
    ///
    /// Fails on a short control stream or a negative size field.
    pub fn parse_control_entry(&mut self) -> Result<ControlEntry> {
        let mut buf = [0u8; CONTROL_ENTRY_LEN];
        self.ctrl_stream.read(&mut buf)?;
        ControlEntry::decode(&buf).inspect_err(|e| log::error!("{e}"))
    }

    /// Fill `buf` with the next bytes of the diff stream.
    pub fn read_diff_stream(&mut self, buf: &mut [u8]) -> Result<()> {
        self.diff_stream.read(buf)
    }

    /// Fill `buf` with the next bytes of the extra stream.
    pub fn read_extra_stream(&mut self, buf: &mut [u8]) -> Result<()> {
        self.extra_stream.read(buf)
    }

    /// Check that every stream was consumed completely.
    pub fn finish(&mut self) -> Result<()> {
        let streams = [
            ("control", &mut self.ctrl_stream),
            ("diff", &mut self.diff_stream),
            ("extra", &mut self.extra_stream),
        ];
        for (name, stream) in streams {
            stream.close().map_err(|e| {
                log::error!("failed to close the {name} stream: {e}");
                match e {
                    PatchError::Format(msg) => {
                        PatchError::Format(format!("{name} stream: {msg}"))
                    }
                    other => other,
                }
            })?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
