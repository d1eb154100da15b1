#![no_main]
use libfuzzer_sys::fuzz_target;
use oxibsdiff::compress::{CompressorType, create_decompressor};

fuzz_target!(|data: &[u8]| {
    // Every backend must reject garbage input without panicking.
    if data.is_empty() {
        return;
    }
    let want = data[0] as usize * 16;
    let input = &data[1..];
    for kind in [
        CompressorType::None,
        CompressorType::Bz2,
        CompressorType::Brotli,
        CompressorType::Lzma,
        CompressorType::Zlib,
    ] {
        if let Ok(mut d) = create_decompressor(kind, input) {
            let mut buf = vec![0u8; want];
            if d.read(&mut buf).is_ok() {
                let _ = d.close();
            }
        }
    }
});
