// Patch writer.
//
// Consumes control entries one at a time, derives the diff and extra bytes
// from the old/new buffers, and streams the three blocks through their
// compressors. Nothing reaches the sink until `close()`, which writes the
// header followed by the compressed control, diff and extra blocks.

use std::io::Write;

use crate::compress::{Compressor, CompressorType, create_compressor_with_quality};
use crate::error::{PatchError, Result};
use crate::format::int64::MAX_MAGNITUDE;
use crate::format::{ControlEntry, PatchFormat, PatchHeader};

/// Diff bytes are computed and fed to the compressor in chunks of this size.
const DIFF_CHUNK: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// PatchWriter trait
// ---------------------------------------------------------------------------

/// Receiver of the control entries produced by the diff engine.
///
/// The engine calls `init` once, then `add_control_entry` for every entry
/// in order, then `close` exactly once.
pub trait PatchWriter<'a> {
    /// Attach the buffers the entries refer to.
    fn init(&mut self, old: &'a [u8], new: &'a [u8]) -> Result<()>;

    /// Add the next control entry. Fails if the entry reads outside `old`
    /// or writes past the end of `new`.
    fn add_control_entry(&mut self, entry: &ControlEntry) -> Result<()>;

    /// Finalize the patch.
    fn close(&mut self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Highest Brotli quality level.
pub const MAX_BROTLI_QUALITY: u32 = 11;

/// Output format and stream backend of a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriterOptions {
    pub format: PatchFormat,
    /// Backend used for all three streams.
    pub compressor: CompressorType,
    /// Brotli quality (0..=11). `None` means the highest.
    pub brotli_quality: Option<u32>,
}

impl WriterOptions {
    /// BSDF2 output with the given backend.
    pub fn bsdf2(compressor: CompressorType) -> Self {
        Self {
            format: PatchFormat::Bsdf2,
            compressor,
            brotli_quality: None,
        }
    }

    /// Same options with an explicit Brotli quality.
    pub fn with_brotli_quality(mut self, quality: u32) -> Self {
        self.brotli_quality = Some(quality);
        self
    }

    /// Check the format can carry the backend, the backend is built in and
    /// the quality is in range.
    pub fn validate(&self) -> Result<()> {
        if let Some(q) = self.brotli_quality
            && q > MAX_BROTLI_QUALITY
        {
            return Err(PatchError::Unsupported(format!(
                "brotli quality {q} is out of range 0..={MAX_BROTLI_QUALITY}"
            )));
        }
        if !self.format.supports(self.compressor) {
            return Err(PatchError::Unsupported(format!(
                "{} patches cannot use the {} compressor",
                self.format, self.compressor
            )));
        }
        if !self.compressor.is_available() {
            return Err(PatchError::Unsupported(format!(
                "the {} compressor is not available in this build",
                self.compressor
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// BsdiffPatchWriter
// ---------------------------------------------------------------------------

/// Writes a BSDIFF40 or BSDF2 patch to `W`.
///
/// # Example
/// ```no_run
/// use oxibsdiff::diff::{self, DiffOptions};
/// use oxibsdiff::suffix::SuffixCache;
/// use oxibsdiff::writer::{BsdiffPatchWriter, WriterOptions};
///
/// let old = b"hello old world";
/// let new = b"hello new world";
/// let mut writer = BsdiffPatchWriter::new(Vec::new(), WriterOptions::default()).unwrap();
/// diff::bsdiff(old, new, &mut writer, SuffixCache::Build, &DiffOptions::default()).unwrap();
/// let patch = writer.into_inner();
/// ```
pub struct BsdiffPatchWriter<'a, W: Write> {
    sink: W,
    options: WriterOptions,
    old: &'a [u8],
    new: &'a [u8],
    initialized: bool,
    closed: bool,
    ctrl_stream: Box<dyn Compressor>,
    diff_stream: Box<dyn Compressor>,
    extra_stream: Box<dyn Compressor>,
    /// Bytes of `new` already covered by entries.
    written_output: u64,
    /// Current read position in `old`.
    old_pos: i64,
    entries: u64,
    /// Total compressed bytes written by `close()`.
    patch_size: u64,
    scratch: Vec<u8>,
}

impl<'a, W: Write> BsdiffPatchWriter<'a, W> {
    /// Create a writer over `sink`. The sink is written once, on close.
    pub fn new(sink: W, options: WriterOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            sink,
            options,
            old: &[],
            new: &[],
            initialized: false,
            closed: false,
            ctrl_stream: create_compressor_with_quality(options.compressor, options.brotli_quality)?,
            diff_stream: create_compressor_with_quality(options.compressor, options.brotli_quality)?,
            extra_stream: create_compressor_with_quality(options.compressor, options.brotli_quality)?,
            written_output: 0,
            old_pos: 0,
            entries: 0,
            patch_size: 0,
            scratch: Vec::new(),
        })
    }

    /// Number of control entries added so far.
    pub fn control_entries(&self) -> u64 {
        self.entries
    }

    /// Bytes of new data covered so far.
    pub fn written_output(&self) -> u64 {
        self.written_output
    }

    /// Size of the finished patch (0 until closed).
    pub fn patch_size(&self) -> u64 {
        self.patch_size
    }

    pub fn options(&self) -> WriterOptions {
        self.options
    }

    /// Return the underlying sink.
    pub fn into_inner(self) -> W {
        self.sink
    }

    fn check_open(&self) -> Result<()> {
        if !self.initialized {
            return Err(PatchError::state("patch writer used before init"));
        }
        if self.closed {
            return Err(PatchError::state("patch writer already closed"));
        }
        Ok(())
    }

    fn write_diff_run(&mut self, new_start: usize, old_start: usize, len: usize) -> Result<()> {
        let (new, old) = (self.new, self.old);
        let new_run = &new[new_start..new_start + len];
        let old_run = &old[old_start..old_start + len];
        for (new_chunk, old_chunk) in new_run.chunks(DIFF_CHUNK).zip(old_run.chunks(DIFF_CHUNK)) {
            self.scratch.clear();
            self.scratch.extend(
                new_chunk
                    .iter()
                    .zip(old_chunk)
                    .map(|(n, o)| n.wrapping_sub(*o)),
            );
            self.diff_stream.write(&self.scratch)?;
        }
        Ok(())
    }

    #[cfg(not(feature = "parallel"))]
    fn finish_streams(&mut self) -> Result<()> {
        self.ctrl_stream.finish()?;
        self.diff_stream.finish()?;
        self.extra_stream.finish()
    }

    #[cfg(feature = "parallel")]
    fn finish_streams(&mut self) -> Result<()> {
        let (ctrl, diff, extra) = (
            &mut self.ctrl_stream,
            &mut self.diff_stream,
            &mut self.extra_stream,
        );
        let (a, (b, c)) = rayon::join(
            || ctrl.finish(),
            || rayon::join(|| diff.finish(), || extra.finish()),
        );
        a?;
        b?;
        c
    }
}

impl<'a, W: Write> PatchWriter<'a> for BsdiffPatchWriter<'a, W> {
    fn init(&mut self, old: &'a [u8], new: &'a [u8]) -> Result<()> {
        if self.initialized {
            return Err(PatchError::state("patch writer initialized twice"));
        }
        self.old = old;
        self.new = new;
        self.initialized = true;
        Ok(())
    }

    fn add_control_entry(&mut self, entry: &ControlEntry) -> Result<()> {
        self.check_open()?;

        if entry.diff_size > MAX_MAGNITUDE || entry.extra_size > MAX_MAGNITUDE {
            return Err(PatchError::range(format!(
                "control entry sizes too large: diff_size {}, extra_size {}",
                entry.diff_size, entry.extra_size
            )));
        }

        let new_size = self.new.len() as u64;
        let end = entry
            .output_len()
            .and_then(|n| n.checked_add(self.written_output))
            .filter(|&end| end <= new_size)
            .ok_or_else(|| {
                PatchError::range(format!(
                    "control entry writes past the new data: written {}, diff_size {}, \
                     extra_size {}, new_size {new_size}",
                    self.written_output, entry.diff_size, entry.extra_size
                ))
            })?;

        let old_size = self.old.len() as u64;
        if entry.diff_size > 0
            && (self.old_pos < 0
                || self.old_pos as u64 >= old_size
                || entry.diff_size > old_size - self.old_pos as u64)
        {
            return Err(PatchError::range(format!(
                "control entry reads old data out of bounds: old_pos {}, diff_size {}, \
                 old_size {old_size}",
                self.old_pos, entry.diff_size
            )));
        }

        let encoded = entry.encode()?;
        self.ctrl_stream.write(&encoded)?;

        let new_pos = self.written_output as usize;
        let diff_size = entry.diff_size as usize;
        let extra_size = entry.extra_size as usize;
        if diff_size > 0 {
            self.write_diff_run(new_pos, self.old_pos as usize, diff_size)?;
        }
        if extra_size > 0 {
            let extra_start = new_pos + diff_size;
            self.extra_stream
                .write(&self.new[extra_start..extra_start + extra_size])?;
        }

        self.old_pos = self
            .old_pos
            .checked_add(entry.diff_size as i64)
            .and_then(|p| p.checked_add(entry.offset_increment))
            .ok_or_else(|| {
                PatchError::range(format!(
                    "old position overflow: old_pos {}, diff_size {}, offset_increment {}",
                    self.old_pos, entry.diff_size, entry.offset_increment
                ))
            })?;
        self.written_output = end;
        self.entries += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.check_open()?;
        self.closed = true;

        let new_size = self.new.len() as u64;
        if self.written_output != new_size {
            return Err(PatchError::range(format!(
                "control entries cover {} of {new_size} new bytes",
                self.written_output
            )));
        }

        self.finish_streams()?;

        let missing = || PatchError::state("compressed stream not finalized");
        let ctrl_data = self.ctrl_stream.compressed_data().ok_or_else(missing)?;
        let diff_data = self.diff_stream.compressed_data().ok_or_else(missing)?;
        let extra_data = self.extra_stream.compressed_data().ok_or_else(missing)?;

        let header = PatchHeader {
            format: self.options.format,
            compressors: [self.options.compressor; 3],
            ctrl_len: ctrl_data.len() as u64,
            diff_len: diff_data.len() as u64,
            new_size: self.written_output,
        };
        let header_bytes = header.encode()?;

        self.sink.write_all(&header_bytes)?;
        self.sink.write_all(ctrl_data)?;
        self.sink.write_all(diff_data)?;
        self.sink.write_all(extra_data)?;
        self.sink.flush()?;

        self.patch_size =
            (header_bytes.len() + ctrl_data.len() + diff_data.len() + extra_data.len()) as u64;
        log::debug!(
            "{} patch closed: {} entries, ctrl {} bytes, diff {} bytes, extra {} bytes",
            self.options.format,
            self.entries,
            ctrl_data.len(),
            diff_data.len(),
            extra_data.len()
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
