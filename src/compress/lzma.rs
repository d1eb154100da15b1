// LZMA stream backend (id 3), the high-ratio option.
//
// lzma-rs works on whole buffers, so the compressor accumulates writes and
// compresses on finish, and the decompressor decodes its entire input range
// when attached.

use std::io;

use super::backend::{Compressor, SliceDecompressor};
use crate::error::{PatchError, Result};

/// Buffering LZMA compressor.
#[derive(Debug, Default)]
pub struct LzmaCompressor {
    pending: Vec<u8>,
    output: Option<Vec<u8>>,
}

impl Compressor for LzmaCompressor {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.output.is_some() {
            return Err(PatchError::state("lzma write after finish"));
        }
        self.pending.extend_from_slice(data);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.output.is_some() {
            return Err(PatchError::state("lzma stream already finished"));
        }
        let pending = std::mem::take(&mut self.pending);
        let mut input = io::Cursor::new(pending.as_slice());
        let mut output = Vec::new();
        lzma_rs::lzma_compress(&mut input, &mut output).map_err(|e| {
            PatchError::Compression(format!(
                "lzma failed to compress {} bytes: {e}",
                pending.len()
            ))
        })?;
        self.output = Some(output);
        Ok(())
    }

    fn compressed_data(&self) -> Option<&[u8]> {
        self.output.as_deref()
    }
}

pub(crate) fn decompressor(input: &[u8]) -> Result<SliceDecompressor<'static>> {
    let mut remaining = input;
    let mut output = Vec::new();
    lzma_rs::lzma_decompress(&mut remaining, &mut output)
        .map_err(|e| PatchError::format(format!("lzma stream: decompression failed: {e}")))?;
    Ok(SliceDecompressor::decoded(output, remaining.len(), "lzma"))
}
