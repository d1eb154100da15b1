// Brotli stream backend (id 2), the high-ratio codec of BSDF2 patches.

use ::brotli::{CompressorWriter, Decompressor};

use super::backend::{ReadDecompressor, WriteCompressor};

/// Highest quality, used unless the caller asks for another.
pub const DEFAULT_QUALITY: u32 = 11;
pub const MAX_QUALITY: u32 = 11;
/// 16 MiB window.
const LGWIN: u32 = 24;
const BUFFER_SIZE: usize = 64 * 1024;

pub(crate) fn compressor(quality: u32) -> WriteCompressor<CompressorWriter<Vec<u8>>> {
    WriteCompressor::new(
        CompressorWriter::new(Vec::new(), BUFFER_SIZE, quality.min(MAX_QUALITY), LGWIN),
        |encoder: CompressorWriter<Vec<u8>>| Ok(encoder.into_inner()),
        "brotli",
    )
}

pub(crate) fn decompressor(input: &[u8]) -> ReadDecompressor<Decompressor<&[u8]>> {
    ReadDecompressor::new(
        Decompressor::new(input, BUFFER_SIZE),
        |d| d.get_ref().len(),
        "brotli",
    )
}
