// Sign-magnitude 32-bit integers used by every numeric field of a patch.
//
// Layout: 4 bytes, the sign carried in bit 7 of byte 3, the magnitude in the
// remaining 31 bits. Bytes 0..3 are written as balanced base-256 digits: each
// digit is `magnitude mod 256` reinterpreted as a signed byte, and a negative
// digit borrows one from the next position. Deployed patches were written this
// way, so the reader folds the low three bytes back in as signed values.
//
// When none of bytes 0..3 has its high bit set the encoding is the plain
// little-endian magnitude.

use std::io::{self, Write};

/// Encoded width of one size field.
pub const SIZE_LEN: usize = 4;

/// Largest magnitude whose top digit still leaves the sign bit clear.
pub const MAX_MAGNITUDE: u32 = 0x7F7F_7F7F;

const SIGN_BIT: u8 = 0x80;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode `value` into its 4-byte wire form.
///
/// Returns `None` when `|value|` exceeds [`MAX_MAGNITUDE`].
pub fn encode_size(value: i32) -> Option<[u8; SIZE_LEN]> {
    let magnitude = value.unsigned_abs();
    if magnitude > MAX_MAGNITUDE {
        return None;
    }

    let mut rest = i64::from(magnitude);
    let mut buf = [0u8; SIZE_LEN];
    for slot in buf.iter_mut().take(SIZE_LEN - 1) {
        let digit = (rest & 0xFF) as u8 as i8;
        *slot = digit as u8;
        rest = (rest - i64::from(digit)) >> 8;
    }
    // rest <= 0x7F here, guaranteed by MAX_MAGNITUDE.
    buf[SIZE_LEN - 1] = rest as u8;
    if value < 0 {
        buf[SIZE_LEN - 1] |= SIGN_BIT;
    }
    Some(buf)
}

/// Encode `value` and write it to a `Write` sink.
pub fn write_size<W: Write>(w: &mut W, value: i32) -> io::Result<()> {
    let buf = encode_size(value).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("size field out of range: {value}"),
        )
    })?;
    w.write_all(&buf)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a 4-byte size field.
#[inline]
pub fn decode_size(buf: [u8; SIZE_LEN]) -> i32 {
    let mut size = i64::from(buf[3] & !SIGN_BIT);
    size = size * 256 + i64::from(buf[2] as i8);
    size = size * 256 + i64::from(buf[1] as i8);
    size = size * 256 + i64::from(buf[0] as i8);
    if buf[3] & SIGN_BIT != 0 {
        size = -size;
    }
    // |size| <= 0x7F * 2^24 + 0x808080, which fits in an i32.
    size as i32
}

/// Decode the size field starting at `data[offset]`.
///
/// Returns `None` if fewer than [`SIZE_LEN`] bytes remain.
pub fn read_size(data: &[u8], offset: usize) -> Option<i32> {
    let end = offset.checked_add(SIZE_LEN)?;
    let bytes: [u8; SIZE_LEN] = data.get(offset..end)?.try_into().ok()?;
    Some(decode_size(bytes))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: i32) {
        let buf = encode_size(value).unwrap();
        assert_eq!(decode_size(buf), value, "roundtrip failed for {value}");
    }

    #[test]
    fn small_values_are_plain_little_endian() {
        assert_eq!(encode_size(0), Some([0, 0, 0, 0]));
        assert_eq!(encode_size(1), Some([1, 0, 0, 0]));
        assert_eq!(encode_size(0x7F), Some([0x7F, 0, 0, 0]));
        assert_eq!(encode_size(0x1234), Some([0x34, 0x12, 0, 0]));
        assert_eq!(encode_size(0x0102_0304), Some([0x04, 0x03, 0x02, 0x01]));
    }

    #[test]
    fn negative_sets_sign_bit() {
        assert_eq!(encode_size(-1), Some([1, 0, 0, 0x80]));
        assert_eq!(encode_size(-0x1234), Some([0x34, 0x12, 0, 0x80]));
    }

    #[test]
    fn high_digit_borrows_from_next_byte() {
        // 200 = 256 - 56: low digit is 0xC8 (-56 signed), next byte carries 1.
        assert_eq!(encode_size(200), Some([0xC8, 0x01, 0, 0]));
        assert_eq!(encode_size(-200), Some([0xC8, 0x01, 0, 0x80]));
        // 0x80 in the middle byte carries into byte 2.
        assert_eq!(encode_size(0x8000), Some([0x00, 0x80, 0x01, 0x00]));
        assert_eq!(decode_size([0xC8, 0x01, 0, 0]), 200);
    }

    #[test]
    fn roundtrip_edges() {
        for v in [
            0,
            1,
            -1,
            127,
            128,
            255,
            256,
            -255,
            0xFFFF,
            0x00FF_FFFF,
            0x0100_0000,
            MAX_MAGNITUDE as i32,
            -(MAX_MAGNITUDE as i32),
        ] {
            roundtrip(v);
        }
    }

    #[test]
    fn roundtrip_sweep() {
        let mut v: i64 = 1;
        while v <= i64::from(MAX_MAGNITUDE) {
            roundtrip(v as i32);
            roundtrip(-(v as i32));
            roundtrip((v - 1) as i32);
            v = v * 3 + 7;
        }
    }

    #[test]
    fn out_of_range_rejected() {
        assert_eq!(encode_size(MAX_MAGNITUDE as i32 + 1), None);
        assert_eq!(encode_size(i32::MAX), None);
        assert_eq!(encode_size(i32::MIN), None);

        let mut out = Vec::new();
        let err = write_size(&mut out, i32::MIN).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(out.is_empty());
    }

    #[test]
    fn read_size_bounds() {
        let data = [0xAA, 5, 0, 0, 0];
        assert_eq!(read_size(&data, 1), Some(5));
        assert_eq!(read_size(&data, 2), None);
        assert_eq!(read_size(&data, usize::MAX), None);
    }

    #[test]
    fn write_size_appends() {
        let mut out = vec![0xEE];
        write_size(&mut out, -3).unwrap();
        assert_eq!(out, [0xEE, 3, 0, 0, 0x80]);
    }
}
