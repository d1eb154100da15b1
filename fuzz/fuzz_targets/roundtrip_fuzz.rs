#![no_main]
use libfuzzer_sys::fuzz_target;
use oxibsdiff::compress::CompressorType;
use oxibsdiff::diff::{self, DiffOptions};
use oxibsdiff::patch;
use oxibsdiff::suffix::SuffixCache;
use oxibsdiff::writer::{BsdiffPatchWriter, WriterOptions};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    // First byte picks the backend and the min-length knob.
    let flags = data[0];
    let payload = &data[1..];
    let split = payload.len() / 2;
    let (old, new) = payload.split_at(split);

    let options = match flags & 3 {
        0 => WriterOptions::default(),
        1 => WriterOptions::bsdf2(CompressorType::None),
        2 => WriterOptions::bsdf2(CompressorType::Zlib),
        _ => WriterOptions::bsdf2(CompressorType::Lzma),
    };
    let diff_opts = DiffOptions::with_min_length((flags >> 2) as usize);

    let mut writer = BsdiffPatchWriter::new(Vec::new(), options).unwrap();
    diff::bsdiff(old, new, &mut writer, SuffixCache::Build, &diff_opts).unwrap();
    let delta = writer.into_inner();

    let patched = patch::apply(old, &delta).unwrap();
    assert_eq!(patched, new, "roundtrip mismatch");
});
