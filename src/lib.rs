//! bsdelta: ENDSLEY/BSDIFF43 binary delta encoding/decoding in Rust.
//!
//! The crate provides:
//! - The patch wire format (`format`)
//! - A suffix-array index over the old buffer (`index`)
//! - The greedy bsdiff encoder (`diff`) and its decoder (`patch`)
//! - File- and stream-oriented helpers (`io`)
//! - Parallel batch helpers (`parallel` feature)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use bsdelta::diff::diff_to_vec;
//! use bsdelta::patch::patch_to_vec;
//!
//! let old = b"hello old world";
//! let new = b"hello new world";
//!
//! let delta = diff_to_vec(old, new).unwrap();
//! let decoded = patch_to_vec(old, &delta).unwrap();
//! assert_eq!(decoded, new);
//! ```

pub mod diff;
pub mod format;
pub mod index;
pub mod io;
pub mod patch;

#[cfg(feature = "parallel")]
pub mod batch;

#[cfg(feature = "cli")]
pub mod cli;

pub use diff::{DiffEncoder, DiffError, diff, diff_to_vec};
pub use index::{Match, SuffixIndex};
pub use patch::{PatchDecoder, PatchError, patch, patch_to_vec};
