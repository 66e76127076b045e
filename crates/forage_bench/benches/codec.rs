//! Value codec benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use forage_bench::{nested, payload, record};
use forage_codec::{deserialize, from_cbor, serialize, to_cbor};

/// Benchmark the string serializer used by text backends.
fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize");

    group.bench_function("record", |b| {
        let value = record(1);
        b.iter(|| black_box(serialize(black_box(&value)).unwrap()));
    });

    group.bench_function("nested_4x4", |b| {
        let value = nested(4, 4);
        b.iter(|| black_box(serialize(black_box(&value)).unwrap()));
    });

    for size in [64, 1024, 16384] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("binary", size), &size, |b, &size| {
            let value = payload(size);
            b.iter(|| black_box(serialize(black_box(&value)).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark parsing serialized text back into values.
fn bench_deserialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("deserialize");

    group.bench_function("record", |b| {
        let text = serialize(&record(1)).unwrap();
        b.iter(|| black_box(deserialize(black_box(&text)).unwrap()));
    });

    for size in [64, 1024, 16384] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("binary", size), &size, |b, &size| {
            let text = serialize(&payload(size)).unwrap();
            b.iter(|| black_box(deserialize(black_box(&text)).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark the structured-clone encoding used by object-store backends.
fn bench_structured_clone(c: &mut Criterion) {
    let mut group = c.benchmark_group("structured_clone");

    group.bench_function("encode_record", |b| {
        let value = record(1);
        b.iter(|| black_box(to_cbor(black_box(&value)).unwrap()));
    });

    group.bench_function("decode_nested_4x4", |b| {
        let bytes = to_cbor(&nested(4, 4)).unwrap();
        b.iter(|| black_box(from_cbor(black_box(&bytes)).unwrap()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_serialize,
    bench_deserialize,
    bench_structured_clone
);
criterion_main!(benches);
