#![no_main]
use libfuzzer_sys::fuzz_target;
use oxibsdiff::patch;
use oxibsdiff::reader::BsdiffPatchReader;

fuzz_target!(|data: &[u8]| {
    // Applying arbitrary bytes as a patch must never panic, only fail.
    let _ = patch::apply(&[], data);

    // Also with a non-empty old buffer.
    if data.len() >= 2 {
        let split = data.len() / 2;
        let (old, delta) = data.split_at(split);
        let _ = patch::apply(old, delta);
    }

    // Walk the control stream directly.
    if let Ok(mut reader) = BsdiffPatchReader::new(data) {
        for _ in 0..64 {
            if reader.parse_control_entry().is_err() {
                break;
            }
        }
        let _ = reader.finish();
    }
});
