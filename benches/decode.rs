//! Record body decoding throughput.
//!
//! Run with: cargo bench --bench decode

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use dossier_pack::{decode, decode_tree, StructLayout};

/// A layout of `fields` fields cycling through the common integer codes, nested two deep.
fn layout(fields: usize) -> StructLayout {
    let codes = ["B", "h", "H", "i", "I", "q"];
    let mut text = String::from("=\n");
    for i in 0..fields {
        text.push_str(&format!("{}\tgroup{}/field{}\n", codes[i % codes.len()], i / 8, i));
    }
    StructLayout::compile(&text).unwrap()
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for fields in [16, 128, 512] {
        let layout = layout(fields);
        let data: Vec<u8> = (0..layout.size()).map(|i| i as u8).collect();
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::new("fields", fields), &data, |b, data| {
            b.iter(|| decode(black_box(&layout), black_box(data), true).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("tree", fields), &data, |b, data| {
            b.iter(|| decode_tree(black_box(&layout), black_box(data), true).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
