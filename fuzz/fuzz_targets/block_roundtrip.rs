#![no_main]

use libfuzzer_sys::fuzz_target;
use rows::Row;
use stream::{BlockReader, BlockWriter, StreamLimits};

fuzz_target!(|data: &[u8]| {
    // Carve the input into rows: each byte picks the next key/value split.
    let mut rows = Vec::new();
    let mut rest = data;
    while let Some((&len, tail)) = rest.split_first() {
        let take = usize::from(len).min(tail.len());
        let (field, tail) = tail.split_at(take);
        let split = field.len() / 2;
        rows.push(Row::decode(&field[..split], &field[split..]));
        rest = tail;
    }

    let mut writer = BlockWriter::new(Vec::new());
    for chunk in rows.chunks(8) {
        writer.write_block(chunk).expect("write to Vec");
    }
    let bytes = writer.finish().expect("flush to Vec");

    let decoded: Vec<Row> = BlockReader::with_limits(bytes.as_slice(), StreamLimits::unlimited())
        .flat_map(|block| block.expect("decode own output"))
        .collect();
    assert_eq!(decoded, rows);
});
