// Stream compression for the three patch blocks.
//
// - `backend` — Compressor/Decompressor traits, CompressorType, factories
// - `bz2`     — bzip2 (legacy BSDIFF40 codec)
// - `brotli`  — Brotli (feature `brotli-backend`)
// - `lzma`    — LZMA via lzma-rs (feature `lzma-backend`)
// - `zlib`    — Zlib via flate2 (feature `zlib-backend`)

pub mod backend;
#[cfg(feature = "brotli-backend")]
pub mod brotli;
mod bz2;
#[cfg(feature = "lzma-backend")]
pub mod lzma;
#[cfg(feature = "zlib-backend")]
mod zlib;

pub use backend::{
    Compressor, CompressorType, Decompressor, StoredCompressor, create_compressor,
    create_compressor_with_quality, create_decompressor,
};
