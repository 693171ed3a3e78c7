//! Matching engine benchmarks.
//!
//! Run with: cargo bench -p meridian-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use meridian_core::{Command, EngineConfig, MatchingEngine, NullSink, OrderId};

fn create_engine() -> MatchingEngine<NullSink> {
    MatchingEngine::with_sink(EngineConfig::default(), NullSink)
}

/// Benchmark inserting into a book with existing orders.
fn bench_insert_deep_book(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_deep_book");
    group.throughput(Throughput::Elements(1));

    for depth in [100u64, 1000, 10000] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let mut engine = create_engine();
            for i in 0..depth {
                let _ = engine.execute(Command::sell(10_000 + i % 100, 100, 1));
            }

            b.iter(|| {
                // Won't match
                black_box(engine.execute(Command::buy(9_990, 100, 2)).ok())
            })
        });
    }

    group.finish();
}

/// Benchmark sweeping several resting orders with one incoming order.
fn bench_match_multiple(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_multiple");
    group.throughput(Throughput::Elements(1));

    for count in [1u64, 5, 10] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter_batched(
                || {
                    let mut engine = create_engine();
                    for _ in 0..count {
                        let _ = engine.execute(Command::sell(10_000, 10, 1));
                    }
                    engine
                },
                |mut engine| black_box(engine.execute(Command::buy(10_000, 10 * count, 2)).ok()),
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

/// Benchmark cancelling from the middle of a long queue.
fn bench_cancel_mid_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("cancel_mid_queue");
    group.throughput(Throughput::Elements(1));

    group.bench_function("1000_deep", |b| {
        b.iter_batched(
            || {
                let mut engine = create_engine();
                for _ in 0..1000 {
                    let _ = engine.execute(Command::buy(10_000, 1, 1));
                }
                engine
            },
            |mut engine| black_box(engine.cancel_order(OrderId(500)).ok()),
            criterion::BatchSize::SmallInput,
        )
    });

    group.finish();
}

/// Benchmark throughput.
fn bench_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput");
    group.throughput(Throughput::Elements(10_000));

    group.bench_function("mixed_workload", |b| {
        b.iter_batched(
            create_engine,
            |mut engine| {
                // Alternating buys and sells across 10 price levels
                for i in 0..10_000u64 {
                    let price = 10_000 + (i % 10);
                    let command = if i % 2 == 0 {
                        Command::buy(price, 100, 1)
                    } else {
                        Command::sell(price, 100, 2)
                    };
                    black_box(engine.execute(command).ok());
                }
            },
            criterion::BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_insert_deep_book,
    bench_match_multiple,
    bench_cancel_mid_queue,
    bench_throughput,
);

criterion_main!(benches);
