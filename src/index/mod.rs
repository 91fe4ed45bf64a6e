// Suffix-array index over the old buffer.
//
// The suffix array is built lazily on the first query (or an explicit
// `suffixes()` call) and kept for the lifetime of the index. Queries bisect
// it to find the old-buffer offset sharing the longest prefix with a
// position in the new buffer.

pub mod qsufsort;

use std::cell::OnceCell;

/// Result of a best-match query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Match {
    /// Offset in the old buffer where the match starts.
    pub pos: usize,
    /// Number of bytes shared with the query suffix.
    pub len: usize,
}

/// Lazily built suffix array over an immutable old buffer.
pub struct SuffixIndex<'a> {
    old: &'a [u8],
    suffixes: OnceCell<Vec<usize>>,
}

impl<'a> SuffixIndex<'a> {
    /// Wrap `old` without sorting anything yet.
    pub fn new(old: &'a [u8]) -> Self {
        Self {
            old,
            suffixes: OnceCell::new(),
        }
    }

    /// The indexed buffer.
    pub fn old(&self) -> &'a [u8] {
        self.old
    }

    /// Whether the suffix array has been built.
    pub fn is_built(&self) -> bool {
        self.suffixes.get().is_some()
    }

    /// The sorted suffix array, building it on first use.
    pub fn suffixes(&self) -> &[usize] {
        self.suffixes.get_or_init(|| qsufsort::suffix_sort(self.old))
    }

    /// Best match for `new[query..]` over the whole suffix array.
    pub fn search(&self, new: &[u8], query: usize) -> Match {
        self.search_range(new, query, 0, self.old.len())
    }

    /// Best match for `new[query..]`, bisecting ranks `start..=end`.
    ///
    /// `end` may equal the buffer length, in which case it only bounds the
    /// bisection and is never itself a candidate. Once the range holds at
    /// most two ranks, the candidate with the longer common prefix wins;
    /// ties go to `end`.
    ///
    /// An `end` past the buffer length is clamped to it. A range that is
    /// empty after clamping (`start > end`, or `start` at or past the
    /// buffer length) yields `Match::default()`.
    pub fn search_range(
        &self,
        new: &[u8],
        query: usize,
        mut start: usize,
        mut end: usize,
    ) -> Match {
        let sa = self.suffixes();
        end = end.min(sa.len());
        if start > end || start >= sa.len() {
            return Match::default();
        }
        let needle = new.get(query..).unwrap_or_default();

        while end - start >= 2 {
            let mid = start + (end - start) / 2;
            let suffix = &self.old[sa[mid]..];
            let n = suffix.len().min(needle.len());
            if suffix[..n] < needle[..n] {
                start = mid;
            } else {
                end = mid;
            }
        }

        let first = Match {
            pos: sa[start],
            len: common_prefix(&self.old[sa[start]..], needle),
        };
        if end == start || end >= sa.len() {
            return first;
        }
        let second = Match {
            pos: sa[end],
            len: common_prefix(&self.old[sa[end]..], needle),
        };
        if first.len > second.len { first } else { second }
    }
}

/// Length of the common prefix of `a` and `b`.
#[inline]
pub fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
