#![no_main]

use libfuzzer_sys::fuzz_target;
use verdict_core::model::{ContextualFactors, Factor};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let _ = Factor::parse_list(text);
    if let Ok(factors) = ContextualFactors::from_cell(text) {
        assert_eq!(ContextualFactors::from_cell(&factors.to_cell()), Ok(factors));
    }
});
