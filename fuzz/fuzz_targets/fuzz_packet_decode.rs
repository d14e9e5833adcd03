#![no_main]
use libfuzzer_sys::fuzz_target;
use weighnode_core::WeightReport;
use weighnode_core::packet::{MAX_PAYLOAD, decode, encode};

fuzz_target!(|data: &[u8]| {
    let Ok(pkt) = decode(data) else {
        assert!(data.is_empty());
        return;
    };
    assert_eq!(pkt.payload.len() + 1, data.len());

    // Any payload text that parses as a report must re-encode within bounds.
    if let Ok(text) = pkt.payload_text()
        && let Ok(report) = WeightReport::parse(text)
    {
        assert!(report.weight.is_finite());
        if text.len() < MAX_PAYLOAD {
            let bytes = encode(pkt.id, text, MAX_PAYLOAD).unwrap_or_default();
            assert_eq!(bytes.as_slice(), data);
        }
    }
});
