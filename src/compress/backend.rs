// Streaming compressor/decompressor contract and backend dispatch.
//
// A patch carries three independently compressed streams. Each stream is
// produced by a `Compressor` (write repeatedly, finish once, then take the
// compressed bytes) and consumed by a `Decompressor` (pull exactly the
// requested bytes, then close, which verifies the input was used up).
//
// Backend ids as written in BSDF2 headers:
//   0 = None (stored), 1 = BZ2, 2 = Brotli, 3 = LZMA, 4 = Zlib

use std::borrow::Cow;
use std::io::{self, Read, Write};

use crate::error::{PatchError, Result};

// ---------------------------------------------------------------------------
// CompressorType
// ---------------------------------------------------------------------------

/// The algorithm used for one patch stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressorType {
    /// Stored without compression.
    None,
    /// bzip2. The only backend of the legacy BSDIFF40 format.
    #[default]
    Bz2,
    /// Brotli. The usual high-ratio choice for BSDF2 patches.
    Brotli,
    /// LZMA. Highest ratio, highest CPU cost.
    Lzma,
    /// Zlib/Deflate.
    Zlib,
}

impl CompressorType {
    /// Id stored in a BSDF2 header.
    pub fn id(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Bz2 => 1,
            Self::Brotli => 2,
            Self::Lzma => 3,
            Self::Zlib => 4,
        }
    }

    /// Inverse of [`CompressorType::id`].
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::None),
            1 => Some(Self::Bz2),
            2 => Some(Self::Brotli),
            3 => Some(Self::Lzma),
            4 => Some(Self::Zlib),
            _ => None,
        }
    }

    /// Whether this build can compress and decompress the backend.
    pub fn is_available(self) -> bool {
        match self {
            Self::None | Self::Bz2 => true,
            Self::Brotli => cfg!(feature = "brotli-backend"),
            Self::Lzma => cfg!(feature = "lzma-backend"),
            Self::Zlib => cfg!(feature = "zlib-backend"),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bz2 => "bz2",
            Self::Brotli => "brotli",
            Self::Lzma => "lzma",
            Self::Zlib => "zlib",
        }
    }
}

impl std::fmt::Display for CompressorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// An in-memory streaming compressor.
///
/// Uncompressed data is fed through `write()` any number of times; after
/// `finish()` the whole compressed stream is available from
/// `compressed_data()`.
pub trait Compressor: Send {
    /// Compress and buffer `data`.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Finalize the stream. Must be called exactly once.
    fn finish(&mut self) -> Result<()>;

    /// The compressed stream, or `None` before `finish()`.
    fn compressed_data(&self) -> Option<&[u8]>;
}

/// A pull-based decompressor over one borrowed input range.
///
/// Construction attaches the input; there is no seeking.
pub trait Decompressor {
    /// Fill `buf` entirely with the next decompressed bytes, or fail.
    fn read(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Verify the stream ended exactly: every compressed byte consumed and
    /// no decompressed byte left unread.
    fn close(&mut self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Factories
// ---------------------------------------------------------------------------

/// Create a compressor for `kind` with its default settings.
pub fn create_compressor(kind: CompressorType) -> Result<Box<dyn Compressor>> {
    create_compressor_with_quality(kind, None)
}

/// Create a compressor for `kind`. `quality` applies to Brotli only
/// (0..=11, default 11) and is ignored by the other backends.
pub fn create_compressor_with_quality(
    kind: CompressorType,
    quality: Option<u32>,
) -> Result<Box<dyn Compressor>> {
    #[cfg(not(feature = "brotli-backend"))]
    let _ = quality;
    match kind {
        CompressorType::None => Ok(Box::new(StoredCompressor::default())),
        CompressorType::Bz2 => Ok(Box::new(super::bz2::compressor())),

        #[cfg(feature = "brotli-backend")]
        CompressorType::Brotli => Ok(Box::new(super::brotli::compressor(
            quality.unwrap_or(super::brotli::DEFAULT_QUALITY),
        ))),

        #[cfg(feature = "lzma-backend")]
        CompressorType::Lzma => Ok(Box::new(super::lzma::LzmaCompressor::default())),

        #[cfg(feature = "zlib-backend")]
        CompressorType::Zlib => Ok(Box::new(super::zlib::compressor())),

        #[allow(unreachable_patterns)]
        other => Err(unavailable(other)),
    }
}

/// Create a decompressor for `kind` reading from `input`.
pub fn create_decompressor<'a>(
    kind: CompressorType,
    input: &'a [u8],
) -> Result<Box<dyn Decompressor + 'a>> {
    match kind {
        CompressorType::None => Ok(Box::new(SliceDecompressor::stored(input))),
        CompressorType::Bz2 => Ok(Box::new(super::bz2::decompressor(input))),

        #[cfg(feature = "brotli-backend")]
        CompressorType::Brotli => Ok(Box::new(super::brotli::decompressor(input))),

        #[cfg(feature = "lzma-backend")]
        CompressorType::Lzma => Ok(Box::new(super::lzma::decompressor(input)?)),

        #[cfg(feature = "zlib-backend")]
        CompressorType::Zlib => Ok(Box::new(super::zlib::decompressor(input))),

        #[allow(unreachable_patterns)]
        other => Err(unavailable(other)),
    }
}

fn unavailable(kind: CompressorType) -> PatchError {
    match kind {
        CompressorType::Brotli => PatchError::Unsupported(
            "Brotli streams require the 'brotli-backend' feature".into(),
        ),
        CompressorType::Lzma => PatchError::Unsupported(
            "LZMA streams require the 'lzma-backend' feature".into(),
        ),
        CompressorType::Zlib => PatchError::Unsupported(
            "Zlib streams require the 'zlib-backend' feature".into(),
        ),
        other => PatchError::Unsupported(format!("unsupported compressor type: {other}")),
    }
}

// ---------------------------------------------------------------------------
// Stored (no compression)
// ---------------------------------------------------------------------------

/// Passthrough "compressor" that stores data verbatim.
#[derive(Debug, Default)]
pub struct StoredCompressor {
    data: Vec<u8>,
    finished: bool,
}

impl Compressor for StoredCompressor {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.finished {
            return Err(PatchError::state("write after finish"));
        }
        self.data.extend_from_slice(data);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Err(PatchError::state("stream already finished"));
        }
        self.finished = true;
        Ok(())
    }

    fn compressed_data(&self) -> Option<&[u8]> {
        self.finished.then_some(self.data.as_slice())
    }
}

// ---------------------------------------------------------------------------
// Shared adapters
// ---------------------------------------------------------------------------

/// Adapter for codecs exposed as an `io::Write` encoder over a `Vec<u8>`.
pub(crate) struct WriteCompressor<E> {
    encoder: Option<E>,
    finish_fn: fn(E) -> io::Result<Vec<u8>>,
    output: Option<Vec<u8>>,
    name: &'static str,
}

impl<E: Write + Send> WriteCompressor<E> {
    pub(crate) fn new(encoder: E, finish_fn: fn(E) -> io::Result<Vec<u8>>, name: &'static str) -> Self {
        Self {
            encoder: Some(encoder),
            finish_fn,
            output: None,
            name,
        }
    }
}

impl<E: Write + Send> Compressor for WriteCompressor<E> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| PatchError::state(format!("{} write after finish", self.name)))?;
        encoder.write_all(data).map_err(|e| {
            PatchError::Compression(format!("{} failed to compress {} bytes: {e}", self.name, data.len()))
        })
    }

    fn finish(&mut self) -> Result<()> {
        let encoder = self
            .encoder
            .take()
            .ok_or_else(|| PatchError::state(format!("{} stream already finished", self.name)))?;
        let output = (self.finish_fn)(encoder).map_err(|e| {
            PatchError::Compression(format!("{} failed to finish compression: {e}", self.name))
        })?;
        self.output = Some(output);
        Ok(())
    }

    fn compressed_data(&self) -> Option<&[u8]> {
        self.output.as_deref()
    }
}

/// Adapter for codecs exposed as an `io::Read` decoder over `&[u8]`.
///
/// `remaining` reports how much of the compressed input the decoder has
/// not consumed yet.
pub(crate) struct ReadDecompressor<D> {
    decoder: D,
    remaining: fn(&D) -> usize,
    name: &'static str,
}

impl<D: Read> ReadDecompressor<D> {
    pub(crate) fn new(decoder: D, remaining: fn(&D) -> usize, name: &'static str) -> Self {
        Self {
            decoder,
            remaining,
            name,
        }
    }
}

impl<D: Read> Decompressor for ReadDecompressor<D> {
    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        self.decoder.read_exact(buf).map_err(|e| {
            PatchError::format(format!(
                "{} stream: unable to read {} bytes: {e}",
                self.name,
                buf.len()
            ))
        })
    }

    fn close(&mut self) -> Result<()> {
        // Drive the decoder to its end-of-stream marker. Some decoders only
        // report buffered trailing input on the read after the end.
        let mut rest = [0u8; 1];
        for _ in 0..2 {
            match self.decoder.read(&mut rest) {
                Ok(0) => {}
                Ok(_) => {
                    return Err(PatchError::format(format!(
                        "{} stream has unread decompressed data",
                        self.name
                    )));
                }
                Err(e) => {
                    return Err(PatchError::format(format!(
                        "{} stream did not end cleanly: {e}",
                        self.name
                    )));
                }
            }
        }
        let left = (self.remaining)(&self.decoder);
        if left != 0 {
            return Err(PatchError::format(format!(
                "{} stream: {left} bytes of compressed input left unconsumed",
                self.name
            )));
        }
        Ok(())
    }
}

/// Decompressor over bytes that are already fully decoded.
pub(crate) struct SliceDecompressor<'a> {
    data: Cow<'a, [u8]>,
    pos: usize,
    /// Compressed input the codec left behind when decoding eagerly.
    unconsumed_input: usize,
    name: &'static str,
}

impl<'a> SliceDecompressor<'a> {
    pub(crate) fn stored(input: &'a [u8]) -> Self {
        Self {
            data: Cow::Borrowed(input),
            pos: 0,
            unconsumed_input: 0,
            name: "stored",
        }
    }

    pub(crate) fn decoded(data: Vec<u8>, unconsumed_input: usize, name: &'static str) -> Self {
        Self {
            data: Cow::Owned(data),
            pos: 0,
            unconsumed_input,
            name,
        }
    }
}

impl Decompressor for SliceDecompressor<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        let available = self.data.len() - self.pos;
        if buf.len() > available {
            return Err(PatchError::format(format!(
                "{} stream: requested {} bytes, only {available} left",
                self.name,
                buf.len()
            )));
        }
        buf.copy_from_slice(&self.data[self.pos..self.pos + buf.len()]);
        self.pos += buf.len();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.unconsumed_input != 0 {
            return Err(PatchError::format(format!(
                "{} stream: {} bytes of compressed input left unconsumed",
                self.name, self.unconsumed_input
            )));
        }
        let left = self.data.len() - self.pos;
        if left != 0 {
            return Err(PatchError::format(format!(
                "{} stream: {left} decompressed bytes left unread",
                self.name
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
