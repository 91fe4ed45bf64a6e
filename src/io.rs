// File- and stream-level helpers around the in-memory codec.
//
// The codec needs complete buffers up front: every offset it computes is
// bounded by the declared lengths. `read_fully()` is the one place a stream
// is turned into such a buffer, and it fails instead of handing back fewer
// bytes than asked for.
//
// With the `file-io` feature, SHA-256 digests of the inputs and output are
// computed alongside.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use log::{debug, warn};
#[cfg(feature = "file-io")]
use sha2::{Digest, Sha256};

use crate::diff::{self, DiffError};
use crate::format::PatchHeader;
use crate::patch::{self, PatchError};

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
    /// Patch output size in bytes.
    pub patch_size: u64,
    /// SHA-256 of the old file (if `file-io` feature is enabled).
    pub old_sha256: Option<[u8; 32]>,
    /// SHA-256 of the new file (if `file-io` feature is enabled).
    pub new_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `patch_file()`.
#[derive(Debug, Clone)]
pub struct PatchStats {
    /// Old file size in bytes.
    pub old_size: u64,
    /// Patch file size in bytes.
    pub patch_size: u64,
    /// Reconstructed output size in bytes.
    pub output_size: u64,
    /// Length recorded in the patch header.
    pub declared_size: i32,
    /// SHA-256 of the reconstructed output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// I/O error (file open, read, write).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Diff encoding error.
    #[error("diff error: {0}")]
    Diff(#[from] DiffError),
    /// Patch decoding error.
    #[error("patch error: {0}")]
    Patch(#[from] PatchError),
    /// A file's digest differs from the expected one.
    #[error("digest mismatch for {path}: expected {expected}, got {actual}")]
    DigestMismatch {
        path: String,
        expected: String,
        actual: String,
    },
}

// ---------------------------------------------------------------------------
// Full reads
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

/// Read exactly `len` bytes from `reader`.
///
/// Short reads are retried until the buffer is full; running out of input
/// first is an `UnexpectedEof` error.
pub fn read_fully<R: Read>(reader: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Read `old_len` and `new_len` bytes from the two readers, then write a
/// patch to `out`. Returns bytes written.
pub fn diff_streams<O: Read, N: Read, W: Write>(
    old: &mut O,
    new: &mut N,
    old_len: usize,
    new_len: usize,
    out: &mut W,
) -> Result<u64, IoError> {
    let old = read_fully(old, old_len)?;
    let new = read_fully(new, new_len)?;
    Ok(diff::diff(&old, &new, out)?)
}

/// Read `old_len` and `patch_len` bytes from the two readers, then write
/// the reconstructed buffer to `out`. Returns bytes written.
pub fn patch_streams<O: Read, P: Read, W: Write>(
    old: &mut O,
    patch: &mut P,
    old_len: usize,
    patch_len: usize,
    out: &mut W,
) -> Result<u64, IoError> {
    let old = read_fully(old, old_len)?;
    let patch = read_fully(patch, patch_len)?;
    Ok(patch::patch(&old, &patch, out)?)
}

// ---------------------------------------------------------------------------
// diff_file
// ---------------------------------------------------------------------------

/// Diff `old_path` against `new_path`, writing the patch to `patch_path`.
///
/// Both inputs are read fully into memory.
pub fn diff_file(
    old_path: &Path,
    new_path: &Path,
    patch_path: &Path,
) -> Result<DiffStats, IoError> {
    let old = std::fs::read(old_path)?;
    let new = std::fs::read(new_path)?;

    let patch_file = File::create(patch_path)?;
    let mut writer = BufWriter::with_capacity(BUF_SIZE, patch_file);
    let patch_size = diff::diff(&old, &new, &mut writer)?;
    writer.flush()?;

    debug!(
        "diff {} -> {}: old {} bytes, new {} bytes, patch {} bytes",
        old_path.display(),
        new_path.display(),
        old.len(),
        new.len(),
        patch_size
    );

    Ok(DiffStats {
        old_size: old.len() as u64,
        new_size: new.len() as u64,
        patch_size,
        old_sha256: digest(&old),
        new_sha256: digest(&new),
    })
}

// ---------------------------------------------------------------------------
// patch_file
// ---------------------------------------------------------------------------

/// Apply the patch at `patch_path` to `old_path`, writing `output_path`.
///
/// The result is reconstructed in memory first; the output file is only
/// created once the whole patch has applied cleanly.
pub fn patch_file(
    old_path: &Path,
    patch_path: &Path,
    output_path: &Path,
) -> Result<PatchStats, IoError> {
    apply_file(old_path, patch_path, output_path, None)
}

/// Like `patch_file()`, but the reconstructed output must hash to
/// `expected_hex` (SHA-256, case-insensitive). On a mismatch nothing is
/// written and `output_path` is left untouched.
#[cfg(feature = "file-io")]
pub fn patch_file_verified(
    old_path: &Path,
    patch_path: &Path,
    output_path: &Path,
    expected_hex: &str,
) -> Result<PatchStats, IoError> {
    apply_file(old_path, patch_path, output_path, Some(expected_hex))
}

fn apply_file(
    old_path: &Path,
    patch_path: &Path,
    output_path: &Path,
    expected_hex: Option<&str>,
) -> Result<PatchStats, IoError> {
    let old = std::fs::read(old_path)?;
    let patch_data = std::fs::read(patch_path)?;

    let (header, _) = PatchHeader::decode(&patch_data).map_err(PatchError::from)?;
    let output = patch::patch_to_vec(&old, &patch_data)?;

    if i64::from(header.new_len) != output.len() as i64 {
        warn!(
            "{}: header declares {} bytes, reconstructed {}",
            patch_path.display(),
            header.new_len,
            output.len()
        );
    }

    let output_sha256 = digest(&output);
    if let Some(expected) = expected_hex {
        check_digest(output_path, output_sha256, expected)?;
    }

    let mut writer = BufWriter::with_capacity(BUF_SIZE, File::create(output_path)?);
    writer.write_all(&output)?;
    writer.flush()?;

    debug!(
        "patch {} + {} -> {}: {} bytes",
        old_path.display(),
        patch_path.display(),
        output_path.display(),
        output.len()
    );

    Ok(PatchStats {
        old_size: old.len() as u64,
        patch_size: patch_data.len() as u64,
        output_size: output.len() as u64,
        declared_size: header.new_len,
        output_sha256,
    })
}

// ---------------------------------------------------------------------------
// Digests
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
fn digest(data: &[u8]) -> Option<[u8; 32]> {
    Some(Sha256::digest(data).into())
}

#[cfg(not(feature = "file-io"))]
fn digest(_data: &[u8]) -> Option<[u8; 32]> {
    None
}

/// Lowercase hex rendering of a digest.
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// SHA-256 of a file, streamed in 64 KiB chunks.
#[cfg(feature = "file-io")]
pub fn file_sha256(path: &Path) -> io::Result<[u8; 32]> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}

/// Check a file against an expected hex SHA-256 (case-insensitive).
#[cfg(feature = "file-io")]
pub fn verify_digest(path: &Path, expected_hex: &str) -> Result<(), IoError> {
    check_digest(path, Some(file_sha256(path)?), expected_hex)
}

/// `path` only names the data in the error.
fn check_digest(
    path: &Path,
    actual: Option<[u8; 32]>,
    expected_hex: &str,
) -> Result<(), IoError> {
    let expected = expected_hex.trim().to_ascii_lowercase();
    let actual = actual.map(|d| hex(&d)).unwrap_or_default();
    if actual != expected {
        return Err(IoError::DigestMismatch {
            path: path.display().to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Reader that hands out at most `chunk` bytes per call.
    struct Trickle<'a> {
        data: &'a [u8],
        chunk: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.chunk.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn read_fully_survives_short_reads() {
        let data: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();
        let mut r = Trickle {
            data: &data,
            chunk: 7,
        };
        assert_eq!(read_fully(&mut r, 1000).unwrap(), data);
    }

    #[test]
    fn read_fully_fails_on_short_input() {
        let mut r = Trickle {
            data: b"abc",
            chunk: 2,
        };
        let err = read_fully(&mut r, 4).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn streams_roundtrip() {
        let old = b"The quick brown fox jumps over the lazy dog. 1234567890";
        let new = b"The quick brown cat sits on the lazy mat. 1234567890!!!";

        let mut patch = Vec::new();
        let wrote = diff_streams(
            &mut Trickle { data: old, chunk: 5 },
            &mut Trickle { data: new, chunk: 3 },
            old.len(),
            new.len(),
            &mut patch,
        )
        .unwrap();
        assert_eq!(wrote, patch.len() as u64);

        let mut out = Vec::new();
        let n = patch_streams(
            &mut &old[..],
            &mut Trickle {
                data: &patch,
                chunk: 11,
            },
            old.len(),
            patch.len(),
            &mut out,
        )
        .unwrap();
        assert_eq!(n, new.len() as u64);
        assert_eq!(out, new);
    }

    #[test]
    fn declared_length_longer_than_stream_fails() {
        let err = diff_streams(
            &mut &b"old"[..],
            &mut &b"new"[..],
            3,
            10,
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, IoError::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn diff_patch_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let old_path = dir.path().join("old.bin");
        let new_path = dir.path().join("new.bin");
        let patch_path = dir.path().join("delta.patch");
        let out_path = dir.path().join("out.bin");

        let old: Vec<u8> = (0..=255u8).cycle().take(1 << 16).collect();
        let mut new = old.clone();
        for i in (0..new.len()).step_by(4096) {
            new[i] = new[i].wrapping_add(1);
        }
        std::fs::write(&old_path, &old).unwrap();
        std::fs::write(&new_path, &new).unwrap();

        let d = diff_file(&old_path, &new_path, &patch_path).unwrap();
        assert_eq!(d.old_size, old.len() as u64);
        assert_eq!(d.new_size, new.len() as u64);
        assert_eq!(d.patch_size, std::fs::metadata(&patch_path).unwrap().len());

        let p = patch_file(&old_path, &patch_path, &out_path).unwrap();
        assert_eq!(p.output_size, new.len() as u64);
        assert_eq!(p.declared_size, new.len() as i32);
        assert_eq!(std::fs::read(&out_path).unwrap(), new);

        #[cfg(feature = "file-io")]
        {
            assert!(d.new_sha256.is_some());
            assert_eq!(p.output_sha256, d.new_sha256);
        }
    }

    #[test]
    fn corrupt_patch_creates_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let old_path = dir.path().join("old.bin");
        let patch_path = dir.path().join("bad.patch");
        let out_path = dir.path().join("out.bin");
        std::fs::write(&old_path, b"old").unwrap();
        std::fs::write(&patch_path, b"NOT A PATCH AT ALL!!!").unwrap();

        let err = patch_file(&old_path, &patch_path, &out_path).unwrap_err();
        assert!(matches!(err, IoError::Patch(PatchError::BadMagic)));
        assert!(!out_path.exists());
    }

    #[cfg(feature = "file-io")]
    #[test]
    fn verify_digest_matches_and_mismatches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::write(&path, b"abc").unwrap();

        let abc = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
        verify_digest(&path, abc).unwrap();
        verify_digest(&path, &abc.to_ascii_uppercase()).unwrap();

        let err = verify_digest(&path, &"0".repeat(64)).unwrap_err();
        assert!(matches!(err, IoError::DigestMismatch { .. }));
    }

    #[cfg(feature = "file-io")]
    #[test]
    fn verified_patch_writes_nothing_on_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let old_path = dir.path().join("old.bin");
        let patch_path = dir.path().join("delta.patch");
        let out_path = dir.path().join("out.bin");
        std::fs::write(&old_path, b"").unwrap();
        std::fs::write(&patch_path, diff::diff_to_vec(b"", b"abc").unwrap()).unwrap();

        let err = patch_file_verified(&old_path, &patch_path, &out_path, &"0".repeat(64))
            .unwrap_err();
        assert!(matches!(err, IoError::DigestMismatch { .. }));
        assert!(!out_path.exists());

        let abc = "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD";
        let stats = patch_file_verified(&old_path, &patch_path, &out_path, abc).unwrap();
        assert_eq!(stats.output_size, 3);
        assert_eq!(std::fs::read(&out_path).unwrap(), b"abc");
    }

    #[test]
    fn hex_renders_lowercase() {
        assert_eq!(hex(&[0x00, 0xAB, 0x7F]), "00ab7f");
    }
}
