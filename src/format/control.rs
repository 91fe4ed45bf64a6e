// Control triples: the 12-byte record header that drives reconstruction.

use std::io::{self, Write};

use super::size::{self, SIZE_LEN};

/// Encoded width of one control triple.
pub const CONTROL_LEN: usize = 3 * SIZE_LEN;

/// One reconstruction step.
///
/// Copy `copy` diff-adjusted bytes from the old-buffer cursor, append
/// `literal` raw bytes from the patch, then move the old cursor by `seek`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Control {
    pub copy: i32,
    pub literal: i32,
    pub seek: i32,
}

impl Control {
    pub fn new(copy: i32, literal: i32, seek: i32) -> Self {
        Self {
            copy,
            literal,
            seek,
        }
    }

    /// Write the triple as three size fields.
    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        size::write_size(w, self.copy)?;
        size::write_size(w, self.literal)?;
        size::write_size(w, self.seek)
    }

    /// Read a triple starting at `data[offset]`, or `None` if fewer than
    /// [`CONTROL_LEN`] bytes remain.
    pub fn decode(data: &[u8], offset: usize) -> Option<Self> {
        Some(Self {
            copy: size::read_size(data, offset)?,
            literal: size::read_size(data, offset.checked_add(SIZE_LEN)?)?,
            seek: size::read_size(data, offset.checked_add(2 * SIZE_LEN)?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_roundtrip() {
        let ctrl = Control::new(300, 0, -77);
        let mut buf = Vec::new();
        ctrl.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), CONTROL_LEN);
        assert_eq!(Control::decode(&buf, 0), Some(ctrl));
    }

    #[test]
    fn decode_needs_full_triple() {
        let mut buf = Vec::new();
        Control::new(1, 2, 3).encode(&mut buf).unwrap();
        buf.pop();
        assert_eq!(Control::decode(&buf, 0), None);
    }

    #[test]
    fn field_order_is_copy_literal_seek() {
        let mut buf = Vec::new();
        Control::new(1, 2, -3).encode(&mut buf).unwrap();
        assert_eq!(buf, [1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0x80]);
    }
}
