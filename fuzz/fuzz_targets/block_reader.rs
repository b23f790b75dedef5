#![no_main]

use libfuzzer_sys::fuzz_target;
use stream::{BlockReader, StreamLimits};

fuzz_target!(|data: &[u8]| {
    // Tight limits keep hostile length prefixes from allocating much.
    let reader = BlockReader::with_limits(data, StreamLimits::for_testing());
    let mut consumed = 0usize;
    for block in reader {
        match block {
            Ok(rows) => consumed += rows.len(),
            Err(_) => break,
        }
        if consumed > 1 << 16 {
            break;
        }
    }
});
