// Diff encoder: greedy scan over the new buffer against a suffix index of
// the old buffer, emitting one (copy, literal, seek) record per committed
// block.
//
// The scan keeps an "implied" alignment `last_offset` (old = new + offset)
// carried over from the previous block. A block is committed once the index
// offers a match that is either no better than continuing the current
// alignment or more than 8 bytes better. The committed region is then split
// into a forward extension from the previous block, a literal middle, and a
// backward extension into the new match, each extension chosen to maximize
// `2 * agreements - length`.

use std::io::{self, Write};

use crate::format::{CONTROL_LEN, Control, HEADER_LEN, MAX_MAGNITUDE, PatchHeader};
use crate::index::SuffixIndex;

/// Matches must beat the current alignment by more than this to commit.
const MIN_IMPROVEMENT: isize = 8;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// The output sink rejected a write.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A buffer is too long for the 31-bit size fields.
    #[error("{which} buffer too large: {len} bytes (max {max})", max = MAX_MAGNITUDE)]
    TooLarge { which: &'static str, len: usize },
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// One committed block, in buffer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Old-buffer offset the copy starts from.
    pub old_start: usize,
    /// New-buffer offset the block starts at.
    pub new_start: usize,
    /// The record as written to the patch.
    pub control: Control,
}

impl Block {
    fn copy_len(&self) -> usize {
        self.control.copy as usize
    }

    fn literal_len(&self) -> usize {
        self.control.literal as usize
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Encodes patches against one old buffer.
///
/// The suffix index is built on the first encode and reused by later ones.
pub struct DiffEncoder<'a> {
    index: SuffixIndex<'a>,
}

impl<'a> DiffEncoder<'a> {
    pub fn new(old: &'a [u8]) -> Self {
        Self {
            index: SuffixIndex::new(old),
        }
    }

    /// The index over the old buffer.
    pub fn index(&self) -> &SuffixIndex<'a> {
        &self.index
    }

    /// Write a complete patch turning the old buffer into `new`.
    ///
    /// Returns the number of bytes written to `out`.
    pub fn encode<W: Write>(&self, new: &[u8], out: &mut W) -> Result<u64, DiffError> {
        let old = self.index.old();
        check_len("old", old.len())?;
        check_len("new", new.len())?;

        let mut wrote = PatchHeader::new(new.len() as i32).encode(out)?;
        let mut diff_buf = Vec::new();

        self.scan(new, |block| {
            block.control.encode(out)?;

            let copy = block.copy_len();
            let old_part = &old[block.old_start..block.old_start + copy];
            let new_part = &new[block.new_start..block.new_start + copy];
            diff_buf.clear();
            diff_buf.extend(
                old_part
                    .iter()
                    .zip(new_part)
                    .map(|(&o, &n)| o.wrapping_sub(n)),
            );
            out.write_all(&diff_buf)?;

            let literal_start = block.new_start + copy;
            out.write_all(&new[literal_start..literal_start + block.literal_len()])?;

            wrote += (CONTROL_LEN + copy + block.literal_len()) as u64;
            Ok(())
        })?;

        Ok(wrote)
    }

    /// The blocks `encode` would write for `new`, without payload.
    pub fn blocks(&self, new: &[u8]) -> Vec<Block> {
        let mut blocks = Vec::new();
        let result: io::Result<()> = self.scan(new, |block| {
            blocks.push(block);
            Ok(())
        });
        debug_assert!(result.is_ok());
        blocks
    }

    /// Drive the greedy scan, handing each committed block to `emit`.
    fn scan<F>(&self, new: &[u8], mut emit: F) -> io::Result<()>
    where
        F: FnMut(Block) -> io::Result<()>,
    {
        let old = self.index.old();
        let old_len = old.len() as isize;
        let new_len = new.len() as isize;

        // old[o] == new[n], with `o` possibly outside the old buffer.
        let agrees = |o: isize, n: isize| {
            o >= 0 && o < old_len && old[o as usize] == new[n as usize]
        };

        let mut scan: isize = 0;
        let mut len: isize = 0;
        let mut pos: isize = 0;
        let mut last_scan: isize = 0;
        let mut last_pos: isize = 0;
        let mut last_offset: isize = 0;

        while scan < new_len {
            let mut matched: isize = 0;
            scan += len;
            let mut scsc = scan;

            while scan < new_len {
                let m = self.index.search(new, scan as usize);
                pos = m.pos as isize;
                len = m.len as isize;

                while scsc < scan + len {
                    if agrees(scsc + last_offset, scsc) {
                        matched += 1;
                    }
                    scsc += 1;
                }

                if (len == matched && len != 0) || len > matched + MIN_IMPROVEMENT {
                    break;
                }

                if agrees(scan + last_offset, scan) {
                    matched -= 1;
                }
                scan += 1;
            }

            if len == matched && scan != new_len {
                continue;
            }

            let gap = scan - last_scan;

            // Forward extension from the previous block.
            let mut len_f: isize = 0;
            {
                let (mut hits, mut best) = (0isize, 0isize);
                let mut i: isize = 0;
                while i < gap && i < old_len - last_pos {
                    if old[(last_pos + i) as usize] == new[(last_scan + i) as usize] {
                        hits += 1;
                    }
                    i += 1;
                    if 2 * hits - i > 2 * best - len_f {
                        best = hits;
                        len_f = i;
                    }
                }
            }

            // Backward extension into the new match.
            let mut len_b: isize = 0;
            if scan < new_len {
                let (mut hits, mut best) = (0isize, 0isize);
                let mut i: isize = 1;
                while i < gap + 1 && i < pos + 1 {
                    if old[(pos - i) as usize] == new[(scan - i) as usize] {
                        hits += 1;
                    }
                    if 2 * hits - i > 2 * best - len_b {
                        best = hits;
                        len_b = i;
                    }
                    i += 1;
                }
            }

            // Overlapping extensions: pick one split point.
            if len_f + len_b > gap {
                let overlap = (last_scan + len_f) - (scan - len_b);
                let (mut score, mut best, mut len_s) = (0isize, 0isize, 0isize);
                for i in 0..overlap {
                    let fwd = last_scan + len_f - overlap + i;
                    if old[(last_pos + len_f - overlap + i) as usize] == new[fwd as usize] {
                        score += 1;
                    }
                    let back = scan - len_b + i;
                    if old[(pos - len_b + i) as usize] == new[back as usize] {
                        score -= 1;
                    }
                    if score > best {
                        best = score;
                        len_s = i;
                    }
                }
                len_f += len_s - overlap;
                len_b -= len_s;
            }

            let control = Control::new(
                len_f as i32,
                (gap - len_f - len_b) as i32,
                (pos - last_pos - len_f - len_b) as i32,
            );
            emit(Block {
                old_start: last_pos as usize,
                new_start: last_scan as usize,
                control,
            })?;

            last_pos = pos - len_b;
            last_scan = scan - len_b;
            last_offset = pos - scan;
        }

        Ok(())
    }
}

fn check_len(which: &'static str, len: usize) -> Result<(), DiffError> {
    if len > MAX_MAGNITUDE as usize {
        return Err(DiffError::TooLarge { which, len });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Convenience entry points
// ---------------------------------------------------------------------------

/// Write a patch turning `old` into `new` to `out`. Returns bytes written.
pub fn diff<W: Write>(old: &[u8], new: &[u8], out: &mut W) -> Result<u64, DiffError> {
    DiffEncoder::new(old).encode(new, out)
}

/// Build a patch turning `old` into `new` in memory.
pub fn diff_to_vec(old: &[u8], new: &[u8]) -> Result<Vec<u8>, DiffError> {
    let mut out = Vec::with_capacity(HEADER_LEN + new.len() / 4);
    diff(old, new, &mut out)?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
