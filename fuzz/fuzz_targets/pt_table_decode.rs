#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Any input that decodes must be in canonical form.
    if let Ok(table) = pt_table::codec::decode(data) {
        assert_eq!(pt_table::codec::encode(&table), data);
    }
});
