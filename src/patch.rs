// Patch decoder: verifies the header, then replays each record against the
// old buffer.
//
// Records are parsed and bounds-checked in full before any of their bytes
// reach the output, so a corrupt record never produces output of its own.
// Output written for earlier, valid records is the caller's to discard when
// an error comes back.

use std::io::{self, Write};

use crate::format::{CONTROL_LEN, Control, HeaderError, PatchHeader};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// The output sink rejected a write.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The patch does not start with the expected magic.
    #[error("corrupt patch: bad magic")]
    BadMagic,
    /// The patch ends inside a header, control triple or payload.
    #[error("corrupt patch: truncated {what} at offset {offset}")]
    Truncated { what: &'static str, offset: usize },
    /// A copy or literal length is negative.
    #[error("corrupt patch: negative {what} length {len} at offset {offset}")]
    NegativeLength {
        what: &'static str,
        len: i32,
        offset: usize,
    },
    /// A copy or seek leaves the old buffer.
    #[error("corrupt patch: old cursor {cursor} out of bounds (old length {old_len})")]
    OutOfBounds { cursor: i64, old_len: usize },
}

impl PatchError {
    /// True for malformed patches, false for sink failures.
    pub fn is_corruption(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

impl From<HeaderError> for PatchError {
    fn from(e: HeaderError) -> Self {
        match e {
            HeaderError::BadMagic => Self::BadMagic,
            HeaderError::Truncated => Self::Truncated {
                what: "size field",
                offset: crate::format::MAGIC.len(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Record iterator
// ---------------------------------------------------------------------------

/// One parsed record, borrowing its payload from the patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'p> {
    /// Patch offset of the control triple.
    pub offset: usize,
    pub control: Control,
    /// `control.copy` diff bytes.
    pub diff: &'p [u8],
    /// `control.literal` raw bytes.
    pub literal: &'p [u8],
}

/// Iterates the records of a patch body, checking framing but not the old
/// buffer.
pub struct Records<'p> {
    patch: &'p [u8],
    pos: usize,
    failed: bool,
}

impl<'p> Records<'p> {
    /// Parse the header of `patch` and position the iterator on the first
    /// record.
    pub fn new(patch: &'p [u8]) -> Result<(PatchHeader, Self), PatchError> {
        let (header, pos) = PatchHeader::decode(patch)?;
        Ok((
            header,
            Self {
                patch,
                pos,
                failed: false,
            },
        ))
    }

    /// Patch offset of the next record.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn next_record(&mut self) -> Result<Record<'p>, PatchError> {
        let offset = self.pos;
        let control = Control::decode(self.patch, offset).ok_or(PatchError::Truncated {
            what: "control triple",
            offset,
        })?;

        let copy = payload_len("copy", control.copy, offset)?;
        let literal = payload_len("literal", control.literal, offset)?;

        let diff_start = offset + CONTROL_LEN;
        let diff = take(self.patch, diff_start, copy, "diff bytes")?;
        let literal_start = diff_start + copy;
        let literal = take(self.patch, literal_start, literal, "literal bytes")?;

        self.pos = literal_start + literal.len();
        Ok(Record {
            offset,
            control,
            diff,
            literal,
        })
    }
}

impl<'p> Iterator for Records<'p> {
    type Item = Result<Record<'p>, PatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.patch.len() {
            return None;
        }
        let result = self.next_record();
        self.failed = result.is_err();
        Some(result)
    }
}

fn payload_len(what: &'static str, len: i32, offset: usize) -> Result<usize, PatchError> {
    usize::try_from(len).map_err(|_| PatchError::NegativeLength { what, len, offset })
}

fn take<'p>(
    patch: &'p [u8],
    start: usize,
    len: usize,
    what: &'static str,
) -> Result<&'p [u8], PatchError> {
    start
        .checked_add(len)
        .and_then(|end| patch.get(start..end))
        .ok_or(PatchError::Truncated {
            what,
            offset: start,
        })
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Replays a patch against one old buffer.
pub struct PatchDecoder<'a> {
    old: &'a [u8],
}

impl<'a> PatchDecoder<'a> {
    pub fn new(old: &'a [u8]) -> Self {
        Self { old }
    }

    /// Reconstruct the new buffer from `patch`, writing it to `out`.
    ///
    /// Returns the number of bytes written. The header's length field is
    /// not compared against the output.
    pub fn apply<W: Write>(&self, patch: &[u8], out: &mut W) -> Result<u64, PatchError> {
        let (_header, records) = Records::new(patch)?;

        let old_len = self.old.len();
        let mut cursor: usize = 0;
        let mut wrote: u64 = 0;
        let mut buf = Vec::new();

        for record in records {
            let record = record?;

            let copy_end = cursor
                .checked_add(record.diff.len())
                .filter(|&end| end <= old_len)
                .ok_or(PatchError::OutOfBounds {
                    cursor: cursor.saturating_add(record.diff.len()) as i64,
                    old_len,
                })?;
            let next_cursor = cursor_after_seek(copy_end, record.control.seek, old_len)?;

            buf.clear();
            buf.extend(
                self.old[cursor..copy_end]
                    .iter()
                    .zip(record.diff)
                    .map(|(&o, &d)| o.wrapping_sub(d)),
            );
            out.write_all(&buf)?;
            out.write_all(record.literal)?;

            wrote += (buf.len() + record.literal.len()) as u64;
            cursor = next_cursor;
        }

        Ok(wrote)
    }
}

fn cursor_after_seek(cursor: usize, seek: i32, old_len: usize) -> Result<usize, PatchError> {
    let target = cursor as i64 + i64::from(seek);
    if target < 0 || target > old_len as i64 {
        return Err(PatchError::OutOfBounds {
            cursor: target,
            old_len,
        });
    }
    Ok(target as usize)
}

// ---------------------------------------------------------------------------
// Convenience entry points
// ---------------------------------------------------------------------------

/// Apply `patch` to `old`, writing the result to `out`. Returns bytes written.
pub fn patch<W: Write>(old: &[u8], patch: &[u8], out: &mut W) -> Result<u64, PatchError> {
    PatchDecoder::new(old).apply(patch, out)
}

/// Apply `patch` to `old` in memory.
pub fn patch_to_vec(old: &[u8], patch: &[u8]) -> Result<Vec<u8>, PatchError> {
    let (header, _) = PatchHeader::decode(patch)?;
    // The declared length is only a capacity hint.
    let hint = usize::try_from(header.new_len).unwrap_or(0).min(patch.len() + old.len());
    let mut out = Vec::with_capacity(hint);
    self::patch(old, patch, &mut out)?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
