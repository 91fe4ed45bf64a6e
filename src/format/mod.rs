// ENDSLEY/BSDIFF43 patch format.
//
// A patch is a 16-byte ASCII magic, one size field carrying the length of
// the reconstructed buffer, then a sequence of records:
//
//   copy:i32  literal:i32  seek:i32  [copy diff bytes]  [literal bytes]
//
// Every integer is a 4-byte sign-magnitude size field (see `size`).
//
// # Modules
//
// - `size`: sign-magnitude integer codec
// - `header`: magic + informational length
// - `control`: the (copy, literal, seek) triple

pub mod control;
pub mod header;
pub mod size;

pub use control::{CONTROL_LEN, Control};
pub use header::{HEADER_LEN, HeaderError, MAGIC, PatchHeader};
pub use size::{MAX_MAGNITUDE, SIZE_LEN};
