// bsdiff diff engine.
//
// Scans the new buffer left to right. At each position the suffix array
// supplies the longest match in old; the scan stops at the first position
// where that match beats the current alignment (old shifted by the last
// offset) by more than FUZZ bytes. The gap between the previous match and
// the new one is then split into a forward-extended approximate copy, a
// verbatim literal, and a backward-extended lead-in to the new match.
//
// Entries are produced lazily by `DiffEngine` and handed to a
// `PatchWriter`; the engine never holds more than one entry.

use std::io::Write;

use crate::error::Result;
use crate::format::ControlEntry;
use crate::suffix::{SuffixArrayIndex, SuffixCache};
use crate::writer::{BsdiffPatchWriter, PatchWriter, WriterOptions};

/// Matches must beat the current alignment by more than this many bytes.
const FUZZ: i64 = 8;

/// Consecutive near-identical scan steps tolerated before forcing a match.
const STALL_LIMIT: u32 = 100;

/// Tuning knobs of the diff search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffOptions {
    /// Matches that only beat the current alignment are accepted when at
    /// least this long. 0 keeps the classic behavior.
    pub min_length: usize,
}

impl DiffOptions {
    pub fn with_min_length(min_length: usize) -> Self {
        Self { min_length }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Compute a patch from `old` to `new` and drive `writer` with it.
///
/// Calls `writer.init` once, `add_control_entry` for each entry in order,
/// and `close` exactly once. The suffix array comes from `cache`.
pub fn bsdiff<'a, P>(
    old: &'a [u8],
    new: &'a [u8],
    writer: &mut P,
    cache: SuffixCache<'_>,
    options: &DiffOptions,
) -> Result<()>
where
    P: PatchWriter<'a> + ?Sized,
{
    let index = cache.resolve(old)?;
    writer.init(old, new)?;

    let mut engine = DiffEngine::new(old, new, &index, options)?;
    for entry in engine.by_ref() {
        writer.add_control_entry(&entry)?;
    }
    log::debug!(
        "diffed {} -> {} bytes: {} entries, {} stalls broken",
        old.len(),
        new.len(),
        engine.entries(),
        engine.stalls_broken()
    );
    writer.close()
}

/// Diff into `sink` with a fresh suffix array and default options.
pub fn diff_to_writer<W: Write>(
    old: &[u8],
    new: &[u8],
    sink: W,
    options: &WriterOptions,
) -> Result<W> {
    let mut writer = BsdiffPatchWriter::new(sink, *options)?;
    bsdiff(old, new, &mut writer, SuffixCache::Build, &DiffOptions::default())?;
    Ok(writer.into_inner())
}

/// Diff into a freshly allocated patch buffer.
pub fn diff_to_vec(old: &[u8], new: &[u8], options: &WriterOptions) -> Result<Vec<u8>> {
    diff_to_writer(old, new, Vec::new(), options)
}

// ---------------------------------------------------------------------------
// DiffEngine
// ---------------------------------------------------------------------------

/// Iterator over the control entries turning `old` into `new`.
pub struct DiffEngine<'d> {
    old: &'d [u8],
    new: &'d [u8],
    index: &'d SuffixArrayIndex,
    min_length: usize,

    scan: usize,
    /// Current match: `len` bytes of `new[scan..]` found at `old[pos..]`.
    len: usize,
    pos: usize,
    /// Where the previous match (after backward extension) started.
    last_scan: usize,
    last_pos: usize,
    /// `pos - scan` of the previous match.
    last_offset: i64,

    entries: u64,
    stalls_broken: u64,
}

impl<'d> DiffEngine<'d> {
    /// `index` must be the suffix array of `old`; an index of another
    /// length is rejected with [`PatchError::State`](crate::PatchError::State).
    pub fn new(
        old: &'d [u8],
        new: &'d [u8],
        index: &'d SuffixArrayIndex,
        options: &DiffOptions,
    ) -> Result<Self> {
        index.check_buffer(old)?;
        Ok(Self {
            old,
            new,
            index,
            min_length: options.min_length,
            scan: 0,
            len: 0,
            pos: 0,
            last_scan: 0,
            last_pos: 0,
            last_offset: 0,
            entries: 0,
            stalls_broken: 0,
        })
    }

    /// Entries produced so far.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// How often the stall breaker forced a match.
    pub fn stalls_broken(&self) -> u64 {
        self.stalls_broken
    }

    /// Whether `new[i]` equals the old byte at the previous alignment.
    #[inline]
    fn matches_last_alignment(&self, i: usize) -> bool {
        let j = i as i64 + self.last_offset;
        j >= 0 && (j as usize) < self.old.len() && self.old[j as usize] == self.new[i]
    }

    /// Advance `scan` to the next position worth emitting an entry for.
    /// Returns the score of the previous alignment over the new match.
    fn find_next_match(&mut self) -> i64 {
        let new_len = self.new.len();
        let mut oldscore: i64 = 0;
        self.scan += self.len;
        let mut scsc = self.scan;
        let mut stalls = 0u32;

        while self.scan < new_len {
            let (prev_len, prev_oldscore, prev_pos) =
                (self.len as i64, oldscore, self.pos as i64);

            let (len, pos) = self.index.longest_match(self.old, &self.new[self.scan..]);
            self.len = len;
            self.pos = pos;

            while scsc < self.scan + len {
                if self.matches_last_alignment(scsc) {
                    oldscore += 1;
                }
                scsc += 1;
            }

            let len = len as i64;
            if (len == oldscore && len != 0)
                || (len > oldscore + FUZZ && self.len >= self.min_length)
            {
                break;
            }

            if self.matches_last_alignment(self.scan) {
                oldscore -= 1;
            }

            // A periodic region can make every step look like the last one
            // shifted by a byte: same length, same score, nearby position.
            let pos = pos as i64;
            let stalled = prev_len - FUZZ <= len
                && len <= prev_len
                && prev_oldscore - FUZZ <= oldscore
                && oldscore <= prev_oldscore
                && prev_pos <= pos
                && pos <= prev_pos + FUZZ
                && oldscore <= len
                && len <= oldscore + FUZZ;
            if stalled {
                stalls += 1;
            } else {
                stalls = 0;
            }
            if stalls > STALL_LIMIT {
                self.stalls_broken += 1;
                break;
            }

            self.scan += 1;
        }
        oldscore
    }

    /// Build the entry covering `new[last_scan..scan - lenb]` and move the
    /// anchors to the current match.
    fn emit(&mut self) -> ControlEntry {
        let (old, new) = (self.old, self.new);
        let (scan, pos) = (self.scan, self.pos);
        let (last_scan, last_pos) = (self.last_scan, self.last_pos);

        // Forward extension from the previous match.
        let mut lenf = 0usize;
        {
            let (mut s, mut best) = (0i64, 0i64);
            let mut i = 0usize;
            while last_scan + i < scan && last_pos + i < old.len() {
                if old[last_pos + i] == new[last_scan + i] {
                    s += 1;
                }
                i += 1;
                if s * 2 - i as i64 > best * 2 - lenf as i64 {
                    best = s;
                    lenf = i;
                }
            }
        }

        // Backward extension from the new match.
        let mut lenb = 0usize;
        if scan < new.len() {
            let (mut s, mut best) = (0i64, 0i64);
            let mut i = 1usize;
            while scan >= last_scan + i && pos >= i {
                if old[pos - i] == new[scan - i] {
                    s += 1;
                }
                if s * 2 - i as i64 > best * 2 - lenb as i64 {
                    best = s;
                    lenb = i;
                }
                i += 1;
            }
        }

        // Split an overlap at the point that keeps the most matching bytes.
        if last_scan + lenf > scan - lenb {
            let overlap = (last_scan + lenf) - (scan - lenb);
            let (mut s, mut best) = (0i64, 0i64);
            let mut lens = 0usize;
            for i in 0..overlap {
                if new[last_scan + lenf - overlap + i] == old[last_pos + lenf - overlap + i] {
                    s += 1;
                }
                if new[scan - lenb + i] == old[pos - lenb + i] {
                    s -= 1;
                }
                if s > best {
                    best = s;
                    lens = i + 1;
                }
            }
            lenf = lenf - overlap + lens;
            lenb -= lens;
        }

        let extra = (scan - lenb) - (last_scan + lenf);
        // The last entry's offset is never applied; keep it neutral.
        let offset = if scan == new.len() {
            0
        } else {
            (pos - lenb) as i64 - (last_pos + lenf) as i64
        };

        self.last_scan = scan - lenb;
        self.last_pos = pos - lenb;
        self.last_offset = pos as i64 - scan as i64;
        self.entries += 1;

        ControlEntry::new(lenf as u64, extra as u64, offset)
    }
}

impl Iterator for DiffEngine<'_> {
    type Item = ControlEntry;

    fn next(&mut self) -> Option<ControlEntry> {
        while self.scan < self.new.len() {
            let oldscore = self.find_next_match();
            if self.len as i64 != oldscore || self.scan == self.new.len() {
                return Some(self.emit());
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PatchError;
    use crate::patch;

    /// Records entries and checks the writer protocol.
    #[derive(Default)]
    struct RecordingWriter {
        entries: Vec<ControlEntry>,
        inits: usize,
        closes: usize,
    }

    impl<'a> PatchWriter<'a> for RecordingWriter {
        fn init(&mut self, _old: &'a [u8], _new: &'a [u8]) -> Result<()> {
            self.inits += 1;
            Ok(())
        }

        fn add_control_entry(&mut self, entry: &ControlEntry) -> Result<()> {
            assert_eq!(self.inits, 1);
            assert_eq!(self.closes, 0);
            self.entries.push(*entry);
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.closes += 1;
            Ok(())
        }
    }

    fn entries(old: &[u8], new: &[u8], options: &DiffOptions) -> Vec<ControlEntry> {
        let mut writer = RecordingWriter::default();
        bsdiff(old, new, &mut writer, SuffixCache::Build, options).unwrap();
        assert_eq!(writer.inits, 1);
        assert_eq!(writer.closes, 1);
        writer.entries
    }

    fn covered(entries: &[ControlEntry]) -> u64 {
        entries.iter().map(|e| e.diff_size + e.extra_size).sum()
    }

    fn pseudo_random(len: usize, mut seed: u32) -> Vec<u8> {
        (0..len)
            .map(|_| {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                (seed >> 16) as u8
            })
            .collect()
    }

    #[test]
    fn pure_insertion() {
        let e = entries(b"", b"Hello World\n", &DiffOptions::default());
        assert_eq!(e, vec![ControlEntry::new(0, 12, 0)]);
    }

    #[test]
    fn identical_buffers() {
        let data = b"The same bytes on both sides of the diff.";
        let e = entries(data, data, &DiffOptions::default());
        assert_eq!(e, vec![ControlEntry::new(data.len() as u64, 0, 0)]);
    }

    #[test]
    fn empty_new_produces_no_entries() {
        let e = entries(b"something old", b"", &DiffOptions::default());
        assert!(e.is_empty());
    }

    #[test]
    fn entries_cover_new_exactly() {
        let old = pseudo_random(4096, 7);
        let mut new = old.clone();
        new[100] ^= 0xff;
        new.splice(2000..2000, b"inserted run of bytes".iter().copied());
        new.truncate(3900);
        let e = entries(&old, &new, &DiffOptions::default());
        assert_eq!(covered(&e), new.len() as u64);
    }

    #[test]
    fn small_edit_round_trips() {
        let old = b"The quick brown fox jumps over the lazy dog".repeat(20);
        let mut new = old.clone();
        new[50] = b'X';
        new.extend_from_slice(b" and a tail");
        let patch = diff_to_vec(&old, &new, &WriterOptions::default()).unwrap();
        assert_eq!(patch::apply(&old, &patch).unwrap(), new);
    }

    #[test]
    fn deterministic_output() {
        let old = pseudo_random(2048, 1);
        let mut new = pseudo_random(512, 2);
        new.extend_from_slice(&old[300..1500]);
        let a = diff_to_vec(&old, &new, &WriterOptions::default()).unwrap();
        let b = diff_to_vec(&old, &new, &WriterOptions::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn stall_breaker_forces_a_match() {
        // new continues old's alignment over a copy of `tail` whose last
        // bytes were flipped, while an exact copy of `tail` sits further
        // on. Each scan step then finds the exact copy only a few bytes
        // better than the current alignment.
        let head = pseudo_random(500, 21);
        let tail = pseudo_random(1000, 22);
        let mut near_tail = tail.clone();
        for b in &mut near_tail[995..] {
            *b ^= 0xff;
        }
        let old = [head.as_slice(), b"z", &near_tail, &pseudo_random(300, 23), &tail].concat();
        let new = [head.as_slice(), b"q", &tail].concat();

        let index = SuffixArrayIndex::build(&old).unwrap();
        let mut engine = DiffEngine::new(&old, &new, &index, &DiffOptions::default()).unwrap();
        let e: Vec<ControlEntry> = engine.by_ref().collect();
        assert!(engine.stalls_broken() > 0);
        assert_eq!(covered(&e), new.len() as u64);

        let patch = diff_to_vec(&old, &new, &WriterOptions::default()).unwrap();
        assert_eq!(patch::apply(&old, &patch).unwrap(), new);
    }

    #[test]
    fn periodic_mismatches_round_trip() {
        let old = pseudo_random(16 * 1024, 3);
        let mut new = old.clone();
        for i in (0..new.len()).step_by(8) {
            new[i] = new[i].wrapping_add(1);
        }
        let e = entries(&old, &new, &DiffOptions::default());
        assert_eq!(covered(&e), new.len() as u64);

        let patch = diff_to_vec(&old, &new, &WriterOptions::default()).unwrap();
        assert_eq!(patch::apply(&old, &patch).unwrap(), new);
    }

    #[test]
    fn engine_rejects_index_of_other_buffer() {
        let index = SuffixArrayIndex::build(b"short").unwrap();
        let old = b"a much longer old buffer";
        assert!(matches!(
            DiffEngine::new(old, b"new", &index, &DiffOptions::default()),
            Err(PatchError::State(_))
        ));
    }

    #[test]
    fn repetitive_input_round_trips() {
        let old = b"abcdefgh".repeat(1000);
        let new = b"abcdefgX".repeat(1000);
        let patch = diff_to_vec(&old, &new, &WriterOptions::default()).unwrap();
        assert_eq!(patch::apply(&old, &patch).unwrap(), new);
    }

    #[test]
    fn min_length_still_covers_new() {
        let old = pseudo_random(4096, 11);
        let mut new = pseudo_random(64, 12);
        new.extend_from_slice(&old[1000..1010]);
        new.extend_from_slice(&pseudo_random(64, 13));
        new.extend_from_slice(&old[2000..3000]);
        for min_length in [0, 16, 4096] {
            let e = entries(&old, &new, &DiffOptions::with_min_length(min_length));
            assert_eq!(covered(&e), new.len() as u64);
        }
    }

    #[test]
    fn borrowed_index_matches_fresh_build() {
        let old = pseudo_random(1024, 5);
        let mut new = old[200..900].to_vec();
        new.extend_from_slice(b"tail");
        let index = SuffixArrayIndex::build(&old).unwrap();

        let mut borrowed = RecordingWriter::default();
        bsdiff(
            &old,
            &new,
            &mut borrowed,
            SuffixCache::Borrowed(&index),
            &DiffOptions::default(),
        )
        .unwrap();
        let fresh = entries(&old, &new, &DiffOptions::default());
        assert_eq!(borrowed.entries, fresh);
    }

    #[test]
    fn wrong_index_is_rejected() {
        let index = SuffixArrayIndex::build(b"abc").unwrap();
        let mut writer = RecordingWriter::default();
        let err = bsdiff(
            b"abcdef",
            b"abc",
            &mut writer,
            SuffixCache::Borrowed(&index),
            &DiffOptions::default(),
        );
        assert!(matches!(err, Err(PatchError::State(_))));
        assert_eq!(writer.inits, 0);
    }

    #[test]
    fn writer_errors_propagate() {
        struct FailingWriter;
        impl<'a> PatchWriter<'a> for FailingWriter {
            fn init(&mut self, _: &'a [u8], _: &'a [u8]) -> Result<()> {
                Ok(())
            }
            fn add_control_entry(&mut self, _: &ControlEntry) -> Result<()> {
                Err(PatchError::range("rejected"))
            }
            fn close(&mut self) -> Result<()> {
                Ok(())
            }
        }
        let err = bsdiff(
            b"",
            b"abc",
            &mut FailingWriter,
            SuffixCache::Build,
            &DiffOptions::default(),
        );
        assert!(matches!(err, Err(PatchError::Range(_))));
    }
}
