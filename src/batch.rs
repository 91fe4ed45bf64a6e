// Parallel batch diffing and patching.
//
// Each pair is an independent invocation with its own index; nothing is
// shared between tasks. Results come back in input order.

use rayon::prelude::*;

use crate::diff::{self, DiffError};
use crate::patch::{self, PatchError};

/// Diff every `(old, new)` pair across the rayon pool.
pub fn diff_pairs<O, N>(pairs: &[(O, N)]) -> Vec<Result<Vec<u8>, DiffError>>
where
    O: AsRef<[u8]> + Sync,
    N: AsRef<[u8]> + Sync,
{
    pairs
        .par_iter()
        .map(|(old, new)| diff::diff_to_vec(old.as_ref(), new.as_ref()))
        .collect()
}

/// Apply every `(old, patch)` pair across the rayon pool.
pub fn patch_pairs<O, P>(pairs: &[(O, P)]) -> Vec<Result<Vec<u8>, PatchError>>
where
    O: AsRef<[u8]> + Sync,
    P: AsRef<[u8]> + Sync,
{
    pairs
        .par_iter()
        .map(|(old, patch)| patch::patch_to_vec(old.as_ref(), patch.as_ref()))
        .collect()
}
