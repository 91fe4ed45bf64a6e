#![no_main]
use bsdelta::format::MAGIC;
use bsdelta::patch;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must decode or fail with an error, never panic.
    let _ = patch::patch_to_vec(&[], data);

    // Behind a valid magic, with a non-empty old buffer, so record parsing
    // and bounds checks are reached.
    if data.len() >= 2 {
        let split = data.len() / 2;
        let (old, body) = data.split_at(split);
        let mut delta = MAGIC.to_vec();
        delta.extend_from_slice(body);
        let _ = patch::patch_to_vec(old, &delta);
    }
});
