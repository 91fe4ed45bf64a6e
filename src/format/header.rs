// Patch header: ASCII magic followed by the informational new-buffer length.

use std::io::{self, Write};

use super::size::{self, SIZE_LEN};

/// Magic bytes at the start of every patch.
pub const MAGIC: &[u8; 16] = b"ENDSLEY/BSDIFF43";

/// Total header length: magic + size field.
pub const HEADER_LEN: usize = MAGIC.len() + SIZE_LEN;

/// Decoded patch header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchHeader {
    /// Length of the buffer the patch reconstructs, as recorded by the
    /// encoder. Informational only: decoding never checks it.
    pub new_len: i32,
}

/// Failure modes of [`PatchHeader::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    /// The first 16 bytes are not [`MAGIC`] (or the patch is shorter).
    BadMagic,
    /// The magic is intact but the size field is cut short.
    Truncated,
}

impl PatchHeader {
    pub fn new(new_len: i32) -> Self {
        Self { new_len }
    }

    /// Write the header (magic + size field). Returns bytes written.
    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<u64> {
        w.write_all(MAGIC)?;
        size::write_size(w, self.new_len)?;
        Ok(HEADER_LEN as u64)
    }

    /// Parse the header at the front of `patch`.
    ///
    /// On success returns the header and the offset of the first record.
    pub fn decode(patch: &[u8]) -> Result<(Self, usize), HeaderError> {
        match patch.get(..MAGIC.len()) {
            Some(magic) if magic == MAGIC => {}
            _ => return Err(HeaderError::BadMagic),
        }
        let new_len = size::read_size(patch, MAGIC.len()).ok_or(HeaderError::Truncated)?;
        Ok((Self { new_len }, HEADER_LEN))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
