#![no_main]
use bsdelta::diff::diff_to_vec;
use bsdelta::patch::patch_to_vec;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // First byte picks the split point between old and new.
    let payload = &data[1..];
    let split = if payload.is_empty() {
        0
    } else {
        usize::from(data[0]) * payload.len() / 255
    };
    let (old, new) = payload.split_at(split.min(payload.len()));

    let delta = diff_to_vec(old, new).unwrap();
    let decoded = patch_to_vec(old, &delta).unwrap();
    assert_eq!(decoded, new);
});
