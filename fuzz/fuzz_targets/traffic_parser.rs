#![no_main]

use contractwatch::stubs::{synthesize_stubs, StubOptions};
use contractwatch::traffic::{group_by_endpoint, parse_str};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(interactions) = parse_str(text) {
            let groups = group_by_endpoint(&interactions);
            let _ = synthesize_stubs(&groups, &StubOptions::default());
        }
    }
});
