//! Storage operation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use forage_bench::{instance, record};
use forage_core::{INDEXEDDB, LOCALSTORAGE, MEMORY, WEBSQL};
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Benchmark a write then read on each built-in driver once ready.
fn bench_set_get(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("set_get");

    for driver in [MEMORY, INDEXEDDB, WEBSQL, LOCALSTORAGE] {
        let forage = instance(driver);
        rt.block_on(forage.ready()).unwrap();
        let value = record(7);

        group.bench_with_input(BenchmarkId::from_parameter(driver), &forage, |b, forage| {
            b.to_async(&rt).iter(|| {
                let forage = forage.clone();
                let value = value.clone();
                async move {
                    forage.set_item("k", value).await.unwrap();
                    black_box(forage.get_item("k").await.unwrap());
                }
            });
        });
    }

    group.finish();
}

/// Benchmark a batch of operations queued before the driver is ready.
fn bench_queued(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("queued_before_ready");

    for count in [1usize, 16, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.to_async(&rt).iter(|| async move {
                let forage = instance(MEMORY);
                let requests: Vec<_> = (0..count)
                    .map(|i| forage.set_item(format!("k{i}"), i as i64))
                    .collect();
                for request in requests {
                    request.await.unwrap();
                }
                black_box(forage.length().await.unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark listing keys in a populated store.
fn bench_keys(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("keys");

    for count in [100usize, 1000] {
        let forage = instance(MEMORY);
        rt.block_on(async {
            for i in 0..count {
                forage.set_item(format!("k{i}"), record(i as i64)).await.unwrap();
            }
        });

        group.bench_with_input(BenchmarkId::from_parameter(count), &forage, |b, forage| {
            b.to_async(&rt).iter(|| {
                let forage = forage.clone();
                async move { black_box(forage.keys().await.unwrap()) }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_set_get, bench_queued, bench_keys);
criterion_main!(benches);
