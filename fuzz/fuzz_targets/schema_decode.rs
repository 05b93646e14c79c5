#![no_main]
use libfuzzer_sys::fuzz_target;
use dossier_pack::{decode_tree, encode, FragmentLayout, StructLayout};

// Input is schema text, a NUL byte, then record bytes.
fuzz_target!(|data: &[u8]| {
    let split = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    let (schema, rest) = data.split_at(split);
    let record = rest.get(1..).unwrap_or(&[]);
    let _ = FragmentLayout::default().decode(record);
    let Ok(text) = std::str::from_utf8(schema) else { return };
    let Ok(layout) = StructLayout::compile(text) else { return };
    if let Ok(tree) = decode_tree(&layout, record, false) {
        if let Ok(out) = encode(&layout, &tree) {
            assert_eq!(out.len(), layout.size());
        }
    }
});
