#![no_main]

use contractwatch::analysis::generalize_url;
use contractwatch::traffic::grouping::normalize_base_path;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = generalize_url(text);
        let once = normalize_base_path(text);
        assert_eq!(normalize_base_path(&once), once);
    }
});
