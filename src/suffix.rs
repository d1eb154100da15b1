// Suffix array over the old buffer and its longest-prefix query.
//
// Construction is delegated to `divsufsort`. The query is a binary search
// over the sorted suffixes that narrows an inclusive range until at most
// two candidates remain, then measures both.

use std::cmp::Ordering;

use crate::error::{PatchError, Result};

/// Length of the common prefix of `a` and `b`.
#[inline]
pub fn match_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

// ---------------------------------------------------------------------------
// SuffixArrayIndex
// ---------------------------------------------------------------------------

/// Lexicographically sorted suffix start offsets of one old buffer.
///
/// The index does not keep the buffer; every query takes it again and it
/// must be the same bytes the index was built from.
#[derive(Debug, Clone)]
pub struct SuffixArrayIndex {
    sa: Vec<i32>,
}

impl SuffixArrayIndex {
    /// Build the suffix array of `old`.
    ///
    /// Fails with [`PatchError::Allocation`] if the array cannot be
    /// allocated or `old` exceeds the 32-bit offsets of the builder.
    pub fn build(old: &[u8]) -> Result<Self> {
        if old.len() > i32::MAX as usize {
            return Err(PatchError::Allocation(format!(
                "old buffer of {} bytes exceeds the suffix array limit of {} bytes",
                old.len(),
                i32::MAX
            )));
        }

        let mut sa: Vec<i32> = Vec::new();
        sa.try_reserve_exact(old.len()).map_err(|e| {
            PatchError::Allocation(format!(
                "suffix array for {} bytes: {e}",
                old.len()
            ))
        })?;
        sa.resize(old.len(), 0);
        if !old.is_empty() {
            divsufsort::sort_in_place(old, &mut sa);
        }
        log::debug!("suffix array built over {} bytes", old.len());
        Ok(Self { sa })
    }

    /// Number of indexed suffixes (the old buffer length).
    pub fn len(&self) -> usize {
        self.sa.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sa.is_empty()
    }

    /// Start offset of the `i`-th smallest suffix.
    #[inline]
    pub fn suffix_at(&self, i: usize) -> usize {
        self.sa[i] as usize
    }

    /// Find a suffix of `old` sharing a (near-)longest prefix with `target`.
    ///
    /// Returns `(match_length, old_position)`. An empty index yields
    /// `(0, 0)`. Fails with [`PatchError::State`] if `old` is not the
    /// length the index was built for.
    pub fn search(&self, old: &[u8], target: &[u8]) -> Result<(usize, usize)> {
        self.check_buffer(old)?;
        Ok(self.longest_match(old, target))
    }

    /// Fail unless `old` has the length this index was built for.
    pub(crate) fn check_buffer(&self, old: &[u8]) -> Result<()> {
        if self.sa.len() != old.len() {
            return Err(PatchError::state(format!(
                "suffix array covers {} bytes but the old buffer has {}",
                self.sa.len(),
                old.len()
            )));
        }
        Ok(())
    }

    /// [`search`](Self::search) without the length check; `old` must be
    /// the indexed buffer.
    #[inline]
    pub(crate) fn longest_match(&self, old: &[u8], target: &[u8]) -> (usize, usize) {
        if self.sa.is_empty() {
            return (0, 0);
        }
        self.search_range(old, target, 0, self.sa.len() - 1)
    }

    /// Bisect the inclusive index range `[low, high]`.
    fn search_range(
        &self,
        old: &[u8],
        target: &[u8],
        mut low: usize,
        mut high: usize,
    ) -> (usize, usize) {
        while high - low >= 2 {
            let mid = low + (high - low) / 2;
            let start = self.suffix_at(mid);
            let n = (old.len() - start).min(target.len());
            if old[start..start + n].cmp(&target[..n]) != Ordering::Greater {
                low = mid;
            } else {
                high = mid;
            }
        }

        let low_pos = self.suffix_at(low);
        let high_pos = self.suffix_at(high);
        let low_len = match_len(&old[low_pos..], target);
        let high_len = match_len(&old[high_pos..], target);
        if low_len > high_len {
            (low_len, low_pos)
        } else {
            (high_len, high_pos)
        }
    }
}

// ---------------------------------------------------------------------------
// Ownership of the index across diff calls
// ---------------------------------------------------------------------------

/// Where the diff engine gets its suffix array from.
///
/// An index may be reused across calls against the *same* old buffer; it
/// is never shared implicitly, so concurrent callers must each hold their
/// own or serialize access.
#[derive(Debug, Default)]
pub enum SuffixCache<'c> {
    /// Build an index for this call and drop it afterwards.
    #[default]
    Build,
    /// Use an index the caller built and keeps.
    Borrowed(&'c SuffixArrayIndex),
    /// Reuse the index in the slot if present; otherwise build one and
    /// leave it there for the caller.
    Slot(&'c mut Option<SuffixArrayIndex>),
}

/// Either a borrowed or a freshly built index.
pub(crate) enum IndexRef<'c> {
    Borrowed(&'c SuffixArrayIndex),
    Owned(SuffixArrayIndex),
}

impl std::ops::Deref for IndexRef<'_> {
    type Target = SuffixArrayIndex;

    fn deref(&self) -> &SuffixArrayIndex {
        match self {
            Self::Borrowed(index) => index,
            Self::Owned(index) => index,
        }
    }
}

impl<'c> SuffixCache<'c> {
    /// Resolve to an index over `old`, building it if needed.
    pub(crate) fn resolve(self, old: &[u8]) -> Result<IndexRef<'c>> {
        let index = match self {
            Self::Build => IndexRef::Owned(SuffixArrayIndex::build(old)?),
            Self::Borrowed(index) => IndexRef::Borrowed(index),
            Self::Slot(slot) => {
                if slot.is_none() {
                    *slot = Some(SuffixArrayIndex::build(old)?);
                }
                match slot.as_ref() {
                    Some(index) => IndexRef::Borrowed(index),
                    None => return Err(PatchError::state("suffix cache slot is empty")),
                }
            }
        };
        index.check_buffer(old)?;
        Ok(index)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
