// File-level helpers for creating and applying patches.
//
// Provides `diff_file()` and `patch_file()`, which read their inputs fully
// into memory, run the in-memory diff or patch, and write the result
// through a `BufWriter`. Optionally computes SHA-256 checksums of the new
// data (feature-gated behind `file-io`).

use std::fs::File;
use std::io::BufWriter;
#[cfg(feature = "file-io")]
use std::io::{self, Write};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::diff::{self, DiffOptions};
use crate::error::Result;
use crate::patch;
use crate::suffix::SuffixCache;
use crate::writer::{BsdiffPatchWriter, WriterOptions};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `diff_file()`.
#[derive(Debug, Clone)]
pub struct DiffStats {
    /// Old file size in bytes.
    pub old_size: u64,
    /// New file size in bytes.
    pub new_size: u64,
    /// Patch size in bytes.
    pub patch_size: u64,
    /// Number of control entries written.
    pub control_entries: u64,
    /// SHA-256 of the new file (if `file-io` feature is enabled).
    pub new_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `patch_file()`.
#[derive(Debug, Clone)]
pub struct PatchStats {
    /// Old file size in bytes.
    pub old_size: u64,
    /// Patch size in bytes.
    pub patch_size: u64,
    /// Reconstructed new file size in bytes.
    pub new_size: u64,
    /// SHA-256 of the reconstructed file (if `file-io` feature is enabled).
    pub new_sha256: Option<[u8; 32]>,
}

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// diff_file
// ---------------------------------------------------------------------------

/// Create a patch turning `old_path` into `new_path`, written to
/// `patch_path`.
///
/// Both inputs are read fully into memory. If anything fails after the
/// patch file was created, the partial file is removed.
pub fn diff_file(
    old_path: &Path,
    new_path: &Path,
    patch_path: &Path,
    writer_opts: &WriterOptions,
    diff_opts: &DiffOptions,
) -> Result<DiffStats> {
    writer_opts.validate()?;
    let old = std::fs::read(old_path)?;
    let new = std::fs::read(new_path)?;

    let patch_file = File::create(patch_path)?;
    let result = write_patch(&old, &new, patch_file, writer_opts, diff_opts);
    if result.is_err() {
        let _ = std::fs::remove_file(patch_path);
    }
    let (patch_size, control_entries) = result?;

    Ok(DiffStats {
        old_size: old.len() as u64,
        new_size: new.len() as u64,
        patch_size,
        control_entries,
        new_sha256: sha256(&new),
    })
}

fn write_patch(
    old: &[u8],
    new: &[u8],
    file: File,
    writer_opts: &WriterOptions,
    diff_opts: &DiffOptions,
) -> Result<(u64, u64)> {
    let sink = BufWriter::with_capacity(BUF_SIZE, file);
    let mut writer = BsdiffPatchWriter::new(sink, *writer_opts)?;
    diff::bsdiff(old, new, &mut writer, SuffixCache::Build, diff_opts)?;

    let stats = (writer.patch_size(), writer.control_entries());
    let file = writer.into_inner().into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(stats)
}

// ---------------------------------------------------------------------------
// patch_file
// ---------------------------------------------------------------------------

/// Apply the patch at `patch_path` to `old_path`, writing `new_path`.
///
/// The old file and the patch are read fully into memory; the output is
/// streamed through a `BufWriter`. A partially written output is removed
/// on failure.
pub fn patch_file(old_path: &Path, patch_path: &Path, new_path: &Path) -> Result<PatchStats> {
    let old = std::fs::read(old_path)?;
    let patch_data = std::fs::read(patch_path)?;

    let new_file = File::create(new_path)?;
    let result = write_new(&old, &patch_data, new_file);
    if result.is_err() {
        let _ = std::fs::remove_file(new_path);
    }
    let (new_size, new_sha256) = result?;

    Ok(PatchStats {
        old_size: old.len() as u64,
        patch_size: patch_data.len() as u64,
        new_size,
        new_sha256,
    })
}

fn write_new(old: &[u8], patch_data: &[u8], file: File) -> Result<(u64, Option<[u8; 32]>)> {
    let mut out = BufWriter::with_capacity(BUF_SIZE, file);

    #[cfg(feature = "file-io")]
    let (new_size, new_sha256) = {
        let mut hasher = sha2::Sha256::new();
        let mut hashing_writer = HashingWriter {
            inner: &mut out,
            hasher: &mut hasher,
        };
        let n = patch::apply_to(old, patch_data, &mut hashing_writer)?;
        (n, Some(hasher.finalize().into()))
    };

    #[cfg(not(feature = "file-io"))]
    let (new_size, new_sha256) = (patch::apply_to(old, patch_data, &mut out)?, None);

    let file = out.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok((new_size, new_sha256))
}

// ---------------------------------------------------------------------------
// Checksums (used with file-io feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
fn sha256(data: &[u8]) -> Option<[u8; 32]> {
    Some(sha2::Sha256::digest(data).into())
}

#[cfg(not(feature = "file-io"))]
fn sha256(_data: &[u8]) -> Option<[u8; 32]> {
    None
}

#[cfg(feature = "file-io")]
struct HashingWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: &'a mut sha2::Sha256,
}

#[cfg(feature = "file-io")]
impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::CompressorType;
    use crate::error::PatchError;
    use std::path::PathBuf;

    fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn diff_patch_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let old_data = b"The quick brown fox jumps over the lazy dog. 1234567890";
        let new_data = b"The quick brown cat sits on the lazy mat. 1234567890!!!";

        let old_path = write_file(dir.path(), "old.bin", old_data);
        let new_path = write_file(dir.path(), "new.bin", new_data);
        let patch_path = dir.path().join("patch.bsdiff");
        let out_path = dir.path().join("out.bin");

        let diff_stats = diff_file(
            &old_path,
            &new_path,
            &patch_path,
            &WriterOptions::default(),
            &DiffOptions::default(),
        )
        .unwrap();
        assert_eq!(diff_stats.old_size, old_data.len() as u64);
        assert_eq!(diff_stats.new_size, new_data.len() as u64);
        assert_eq!(
            diff_stats.patch_size,
            std::fs::metadata(&patch_path).unwrap().len()
        );
        assert!(diff_stats.control_entries >= 1);

        let patch_stats = patch_file(&old_path, &patch_path, &out_path).unwrap();
        assert_eq!(patch_stats.new_size, new_data.len() as u64);
        assert_eq!(std::fs::read(&out_path).unwrap(), new_data);
    }

    #[test]
    fn empty_old_file() {
        let dir = tempfile::tempdir().unwrap();
        let old_path = write_file(dir.path(), "old.bin", b"");
        let new_path = write_file(dir.path(), "new.bin", b"standalone data");
        let patch_path = dir.path().join("patch.bsdiff");
        let out_path = dir.path().join("out.bin");

        diff_file(
            &old_path,
            &new_path,
            &patch_path,
            &WriterOptions::bsdf2(CompressorType::None),
            &DiffOptions::default(),
        )
        .unwrap();
        patch_file(&old_path, &patch_path, &out_path).unwrap();
        assert_eq!(std::fs::read(&out_path).unwrap(), b"standalone data");
    }

    #[cfg(feature = "file-io")]
    #[test]
    fn sha256_checksums_agree() {
        let dir = tempfile::tempdir().unwrap();
        let old_path = write_file(dir.path(), "old.bin", b"old data for checksum test");
        let new_path = write_file(dir.path(), "new.bin", b"new data for checksum test");
        let patch_path = dir.path().join("patch.bsdiff");
        let out_path = dir.path().join("out.bin");

        let diff_stats = diff_file(
            &old_path,
            &new_path,
            &patch_path,
            &WriterOptions::default(),
            &DiffOptions::default(),
        )
        .unwrap();
        let patch_stats = patch_file(&old_path, &patch_path, &out_path).unwrap();
        assert!(diff_stats.new_sha256.is_some());
        assert_eq!(diff_stats.new_sha256, patch_stats.new_sha256);
    }

    #[test]
    fn missing_input_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = diff_file(
            &dir.path().join("nope"),
            &dir.path().join("nope2"),
            &dir.path().join("patch"),
            &WriterOptions::default(),
            &DiffOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PatchError::Io(_)));
        assert!(!dir.path().join("patch").exists());
    }

    #[test]
    fn corrupt_patch_removes_output() {
        let dir = tempfile::tempdir().unwrap();
        let old_path = write_file(dir.path(), "old.bin", b"old");
        let patch_path = write_file(dir.path(), "patch.bsdiff", b"BSDIFF40 but not really a patch");
        let out_path = dir.path().join("out.bin");

        let err = patch_file(&old_path, &patch_path, &out_path).unwrap_err();
        assert!(matches!(err, PatchError::Format(_)));
        assert!(!out_path.exists());
    }
}
