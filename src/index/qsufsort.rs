// Larsson-Sadakane suffix sorting (qsufsort) by prefix doubling.
//
// `I` holds suffix offsets in rank order. During refinement a negative
// entry `-n` marks a run of `n` slots that is already fully sorted, so the
// sweep can skip it. `V[offset]` is the group number of the suffix starting
// at `offset`: the rank slot of the last member of its group. Suffixes past
// the end of the buffer have key -1, so a shorter suffix sorts first.
//
// Both arrays live in one `Sorter`; `split` works on `(start, len)` ranges
// of that storage and never copies it.

/// Groups smaller than this are split with the quadratic selection pass.
const INSERTION_SORT_MAX: usize = 16;

/// Build the suffix array of `data`: offsets ordered by the unsigned
/// lexicographic order of the suffixes they start.
pub fn suffix_sort(data: &[u8]) -> Vec<usize> {
    let n = data.len();
    if n == 0 {
        return Vec::new();
    }

    let mut sorter = Sorter::bucketed(data);
    sorter.refine();
    sorter.into_suffix_array()
}

struct Sorter {
    /// Rank order (`I`). Negative entries are sorted-run markers.
    ranks: Vec<isize>,
    /// Group of each offset (`V`).
    groups: Vec<isize>,
}

impl Sorter {
    /// Radix pass on the first byte: one group per distinct byte value.
    fn bucketed(data: &[u8]) -> Self {
        let n = data.len();

        let mut buckets = [0usize; 256];
        for &b in data {
            buckets[usize::from(b)] += 1;
        }
        for c in 1..256 {
            buckets[c] += buckets[c - 1];
        }
        // Shift to bucket start offsets.
        for c in (1..256).rev() {
            buckets[c] = buckets[c - 1];
        }
        buckets[0] = 0;

        let mut ranks = vec![0isize; n];
        for (offset, &b) in data.iter().enumerate() {
            let slot = &mut buckets[usize::from(b)];
            ranks[*slot] = offset as isize;
            *slot += 1;
        }
        // buckets[c] is now one past the last slot of bucket c.

        let groups: Vec<isize> = data
            .iter()
            .map(|&b| buckets[usize::from(b)] as isize - 1)
            .collect();

        for c in 1..256 {
            if buckets[c] == buckets[c - 1] + 1 {
                ranks[buckets[c] - 1] = -1;
            }
        }
        if buckets[0] == 1 {
            ranks[0] = -1;
        }

        Self { ranks, groups }
    }

    /// Group key of the suffix `h` bytes after `offset`.
    #[inline]
    fn key(&self, offset: isize, h: usize) -> isize {
        let pos = offset as usize + h;
        if pos < self.groups.len() {
            self.groups[pos]
        } else {
            -1
        }
    }

    /// Double `h` until every suffix sits in a singleton group.
    fn refine(&mut self) {
        let n = self.ranks.len();
        let mut h = 1usize;
        while self.ranks[0] != -(n as isize) {
            // Length of the sorted run accumulated so far.
            let mut run = 0usize;
            let mut i = 0usize;
            while i < n {
                let entry = self.ranks[i];
                if entry < 0 {
                    let skip = entry.unsigned_abs();
                    run += skip;
                    i += skip;
                } else {
                    if run > 0 {
                        self.ranks[i - run] = -(run as isize);
                    }
                    let group_len = (self.groups[entry as usize] + 1) as usize - i;
                    self.split(i, group_len, h);
                    i += group_len;
                    run = 0;
                }
            }
            if run > 0 {
                self.ranks[n - run] = -(run as isize);
            }
            h += h;
        }
    }

    /// Split the unsorted group `ranks[start..start + len]` by the key at
    /// distance `h`.
    fn split(&mut self, mut start: usize, mut len: usize, h: usize) {
        loop {
            if len < INSERTION_SORT_MAX {
                self.split_small(start, len, h);
                return;
            }

            let end = start + len;
            let pivot = self.key(self.ranks[start + len / 2], h);

            let mut small = 0usize;
            let mut equal = 0usize;
            for idx in start..end {
                let k = self.key(self.ranks[idx], h);
                if k < pivot {
                    small += 1;
                } else if k == pivot {
                    equal += 1;
                }
            }

            let small_end = start + small;
            let equal_end = small_end + equal;

            // Three cursors: `i` sweeps the < region, `j` fills =, `k` fills >.
            let (mut i, mut j, mut k) = (start, small_end, equal_end);
            while i < small_end {
                let key = self.key(self.ranks[i], h);
                if key < pivot {
                    i += 1;
                } else if key == pivot {
                    self.ranks.swap(i, j);
                    j += 1;
                } else {
                    self.ranks.swap(i, k);
                    k += 1;
                }
            }
            while j < equal_end {
                if self.key(self.ranks[j], h) == pivot {
                    j += 1;
                } else {
                    self.ranks.swap(j, k);
                    k += 1;
                }
            }

            if small_end > start {
                self.split(start, small_end - start, h);
            }

            for idx in small_end..equal_end {
                let offset = self.ranks[idx] as usize;
                self.groups[offset] = equal_end as isize - 1;
            }
            if equal_end == small_end + 1 {
                self.ranks[small_end] = -1;
            }

            if equal_end >= end {
                return;
            }
            start = equal_end;
            len = end - equal_end;
        }
    }

    /// Selection pass for small groups: repeatedly gather the minimum-key
    /// members at the front and close them off as a new group.
    fn split_small(&mut self, start: usize, len: usize, h: usize) {
        let end = start + len;
        let mut i = start;
        while i < end {
            let mut min = self.key(self.ranks[i], h);
            let mut k = i + 1;
            for j in i + 1..end {
                let key = self.key(self.ranks[j], h);
                if key < min {
                    min = key;
                    k = i;
                }
                if key == min {
                    self.ranks.swap(j, k);
                    k += 1;
                }
            }
            for idx in i..k {
                let offset = self.ranks[idx] as usize;
                self.groups[offset] = k as isize - 1;
            }
            if k == i + 1 {
                self.ranks[i] = -1;
            }
            i = k;
        }
    }

    /// Invert the final groups into rank order.
    fn into_suffix_array(self) -> Vec<usize> {
        let mut sa = vec![0usize; self.groups.len()];
        for (offset, &group) in self.groups.iter().enumerate() {
            sa[group as usize] = offset;
        }
        sa
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(data: &[u8]) -> Vec<usize> {
        let mut sa: Vec<usize> = (0..data.len()).collect();
        sa.sort_by(|&a, &b| data[a..].cmp(&data[b..]));
        sa
    }

    fn check(data: &[u8]) {
        assert_eq!(suffix_sort(data), naive(data), "input {:?}", data);
    }

    #[test]
    fn empty_and_single() {
        assert!(suffix_sort(b"").is_empty());
        assert_eq!(suffix_sort(b"x"), vec![0]);
    }

    #[test]
    fn banana() {
        assert_eq!(suffix_sort(b"banana"), vec![5, 3, 1, 0, 4, 2]);
    }

    #[test]
    fn distinct_bytes() {
        check(b"abcdef");
        check(b"fedcba");
    }

    #[test]
    fn runs_of_one_byte() {
        check(&[7u8; 1]);
        check(&[7u8; 15]);
        check(&[7u8; 16]);
        check(&[7u8; 100]);
    }

    #[test]
    fn high_bytes_sort_unsigned() {
        let data = [0x80u8, 0x7F, 0xFF, 0x00, 0x80, 0x7F];
        check(&data);
        let sa = suffix_sort(&data);
        // 0x00 first, 0xFF last.
        assert_eq!(sa[0], 3);
        assert_eq!(sa[sa.len() - 1], 2);
    }

    #[test]
    fn periodic_inputs_exercise_ternary_split() {
        let abab: Vec<u8> = b"ab".iter().copied().cycle().take(257).collect();
        check(&abab);
        let abc: Vec<u8> = b"abcabd".iter().copied().cycle().take(500).collect();
        check(&abc);
    }

    #[test]
    fn pseudo_random_inputs() {
        let mut s: u64 = 0x9E37_79B9_7F4A_7C15;
        for len in [2usize, 17, 64, 255, 1000, 4096] {
            for alphabet in [2u64, 4, 256] {
                let data: Vec<u8> = (0..len)
                    .map(|_| {
                        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
                        ((s >> 33) % alphabet) as u8
                    })
                    .collect();
                check(&data);
            }
        }
    }
}
