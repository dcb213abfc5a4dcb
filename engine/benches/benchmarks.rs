//! Performance benchmarks for binder-engine

use binder_engine::{
    merge, reconcile, CardQuantity, ChangeQueue, Collection, CollectionExport, PendingChange,
    SyncMessage, SyncPayload,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn build_collection(size: usize, offset: usize) -> Collection {
    (0..size)
        .map(|i| {
            let n = (i + offset) as u32;
            (
                format!("card_{}", i + offset),
                CardQuantity::new(n % 5 + 1, n % 3),
            )
        })
        .collect()
}

fn bench_mutations(c: &mut Criterion) {
    let mut group = c.benchmark_group("mutations");

    group.bench_function("add", |b| {
        let mut collection = Collection::new();
        let mut id = 0u64;

        b.iter(|| {
            id += 1;
            collection.add(black_box(&format!("card_{}", id % 1000)), 1, id % 2 == 0)
        })
    });

    group.bench_function("remove", |b| {
        let mut collection = build_collection(1000, 0);
        let mut id = 0u64;

        b.iter(|| {
            id += 1;
            collection.remove(black_box(&format!("card_{}", id % 1000)), 1, false)
        })
    });

    group.bench_function("stats", |b| {
        let collection = build_collection(1000, 0);
        b.iter(|| black_box(&collection).stats())
    });

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for size in [10, 100, 1000, 10_000].iter() {
        // Half of each side overlaps the other
        let local = build_collection(*size, 0);
        let remote = build_collection(*size, size / 2);

        group.bench_with_input(BenchmarkId::new("merge", size), size, |b, _| {
            b.iter(|| merge(black_box(&local), black_box(&remote)))
        });

        group.bench_with_input(BenchmarkId::new("reconcile", size), size, |b, _| {
            b.iter(|| reconcile(black_box(&local), black_box(&remote)))
        });
    }

    group.finish();
}

fn bench_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialization");

    for size in [100, 1000].iter() {
        let collection = build_collection(*size, 0);

        group.bench_with_input(BenchmarkId::new("export", size), size, |b, _| {
            let export = CollectionExport::new(collection.clone(), 1000);
            b.iter(|| black_box(&export).to_json())
        });

        group.bench_with_input(BenchmarkId::new("import", size), size, |b, _| {
            let json = CollectionExport::new(collection.clone(), 1000)
                .to_json()
                .unwrap_or_default();
            b.iter(|| CollectionExport::from_json(black_box(&json)))
        });

        group.bench_with_input(BenchmarkId::new("message_to_json", size), size, |b, _| {
            let msg = SyncMessage::new(
                SyncPayload::CollectionUpdated(collection.clone()),
                1000,
                "tab-1",
            );
            b.iter(|| black_box(&msg).to_json())
        });

        group.bench_with_input(BenchmarkId::new("queue_round_trip", size), size, |b, _| {
            let mut queue = ChangeQueue::new();
            queue.enqueue(PendingChange::collection_update(collection.clone(), 1000));
            b.iter(|| {
                let json = black_box(&queue).to_json().unwrap_or_default();
                ChangeQueue::from_json(&json)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_mutations, bench_merge, bench_serialization,);
criterion_main!(benches);
