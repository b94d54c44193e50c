#![no_main]
use libfuzzer_sys::fuzz_target;
use oabkit::lzx::{LzxDecoder, decompress_full, decompress_patch};

fuzz_target!(|data: &[u8]| {
    // Containers and raw streams must fail with errors, never panic.
    let _ = decompress_full(data);

    if data.len() >= 2 {
        let split = data.len() / 2;
        let (source, patch) = data.split_at(split);
        let _ = decompress_patch(source, patch);
    }

    if let Ok(decoder) = LzxDecoder::new(17) {
        let _ = decoder.decompress(data, data.len().saturating_mul(4).min(1 << 17));
    }
});
