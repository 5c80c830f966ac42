#![no_main]

use libfuzzer_sys::fuzz_target;
use verdict_core::store::RecordStore;

fuzz_target!(|data: &[u8]| {
    // Any snapshot that loads must serialize and load back to the same rows.
    let Ok(store) = RecordStore::from_snapshot("fuzz", data, "fuzz.csv") else {
        return;
    };
    let bytes = store.serialize("fuzz").expect("loaded snapshot serializes");
    let again = RecordStore::from_snapshot("fuzz", &bytes, "again.csv").expect("reload");
    let before: Vec<_> = store.records("fuzz").collect();
    let after: Vec<_> = again.records("fuzz").collect();
    assert_eq!(before, after);
});
