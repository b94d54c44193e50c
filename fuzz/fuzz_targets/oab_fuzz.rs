#![no_main]
use libfuzzer_sys::fuzz_target;
use oabkit::CancelToken;
use oabkit::oab::OabDecoder;

fuzz_target!(|data: &[u8]| {
    let mut decoder = OabDecoder::from_bytes(data.to_vec());
    let _ = decoder.header_record();
    let cancel = CancelToken::new();
    if let Ok(records) = decoder.records(|_, _| true, &cancel) {
        for item in records.take(4096) {
            if item.is_err() {
                break;
            }
        }
    }
    let _ = decoder.contact_at_offset(u64::from(data.first().copied().unwrap_or(0)));
});
