//! Handle operation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shelfdb_bench::{generate_entries, random_value};
use shelfdb_core::{Handle, Mode, Options, SyncPolicy};
use std::time::Duration;
use tempfile::TempDir;

fn memory_handle() -> Handle {
    Handle::open(Options::new().mode(Mode::Memory).collection("bench")).unwrap()
}

/// Benchmark single writes.
fn bench_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("set");

    for size in [64, 256, 1024, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("memory", size), size, |b, &size| {
            let handle = memory_handle();
            let value = random_value(size);
            let mut i = 0u64;

            b.iter(|| {
                i += 1;
                handle
                    .set(&format!("key-{i}"), black_box(&value), Duration::from_secs(3600))
                    .unwrap();
            });
        });
    }

    for policy in [SyncPolicy::Never, SyncPolicy::EverySecond] {
        group.bench_function(BenchmarkId::new("file", policy.as_str()), |b| {
            let dir = TempDir::new().unwrap();
            let handle = Handle::open(
                Options::new()
                    .file(dir.path().join("bench.db"))
                    .mode(Mode::File)
                    .collection("bench")
                    .sync_policy(policy)
                    .auto_shrink_disabled(true),
            )
            .unwrap();
            let value = random_value(256);
            let mut i = 0u64;

            b.iter(|| {
                i += 1;
                handle
                    .set_with_no_expiration(&format!("key-{i}"), black_box(&value))
                    .unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark single reads.
fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");

    for count in [100, 10_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let handle = memory_handle();
            let entries = generate_entries(count, 128);
            for (key, value) in &entries {
                handle.set_with_no_expiration(key, value).unwrap();
            }
            let mut i = 0usize;

            b.iter(|| {
                i = (i + 1) % count;
                black_box(handle.get(&entries[i].0).unwrap());
            });
        });
    }
    group.finish();
}

/// Benchmark prefix scans with a second, larger collection present.
fn bench_get_keys(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_keys");

    for count in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let handle = memory_handle();
            for (key, value) in generate_entries(count, 32) {
                handle.set_with_no_expiration(&key, &value).unwrap();
                handle
                    .set_to_collection_with_no_expiration("other", &key, &value)
                    .unwrap();
            }

            b.iter(|| {
                let keys = handle.get_keys().unwrap();
                assert_eq!(keys.len(), count);
                black_box(keys);
            });
        });
    }
    group.finish();
}

/// Benchmark bulk deletion of half a collection, refilled per iteration.
fn bench_delete_where(c: &mut Criterion) {
    let mut group = c.benchmark_group("delete_where");

    for count in [100, 1_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let handle = memory_handle();
            let entries = generate_entries(count, 32);

            b.iter(|| {
                for (i, (key, _)) in entries.iter().enumerate() {
                    let value = if i % 2 == 0 { "even" } else { "odd" };
                    handle.set_with_no_expiration(key, value).unwrap();
                }
                let deleted = handle.delete_where(|_, v| v == "even").unwrap();
                black_box(deleted);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_set, bench_get, bench_get_keys, bench_delete_where);
criterion_main!(benches);
