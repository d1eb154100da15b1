// Zlib/Deflate stream backend (id 4).
//
// Uses the zlib container (header + Adler-32 trailer), so a truncated or
// corrupted stream is detected on close.

use flate2::Compression;
use flate2::bufread::ZlibDecoder;
use flate2::write::ZlibEncoder;

use super::backend::{ReadDecompressor, WriteCompressor};

const ZLIB_LEVEL: u32 = 9;

pub(crate) fn compressor() -> WriteCompressor<ZlibEncoder<Vec<u8>>> {
    WriteCompressor::new(
        ZlibEncoder::new(Vec::new(), Compression::new(ZLIB_LEVEL)),
        ZlibEncoder::finish,
        "zlib",
    )
}

pub(crate) fn decompressor(input: &[u8]) -> ReadDecompressor<ZlibDecoder<&[u8]>> {
    ReadDecompressor::new(ZlibDecoder::new(input), |d| d.get_ref().len(), "zlib")
}
