// bzip2 stream backend (id 1), the codec of the legacy BSDIFF40 format.

use bzip2::Compression;
use bzip2::bufread::BzDecoder;
use bzip2::write::BzEncoder;

use super::backend::{ReadDecompressor, WriteCompressor};

/// Block size 900k, as used by upstream bsdiff.
const BZ2_LEVEL: u32 = 9;

pub(crate) fn compressor() -> WriteCompressor<BzEncoder<Vec<u8>>> {
    WriteCompressor::new(
        BzEncoder::new(Vec::new(), Compression::new(BZ2_LEVEL)),
        BzEncoder::finish,
        "bz2",
    )
}

pub(crate) fn decompressor(input: &[u8]) -> ReadDecompressor<BzDecoder<&[u8]>> {
    ReadDecompressor::new(BzDecoder::new(input), |d| d.get_ref().len(), "bz2")
}
