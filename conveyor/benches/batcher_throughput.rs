//! Throughput benchmark for the batcher operator (spec §4.4).
//!
//! Measures how many items per second a [`BatcherOperator`] moves from
//! upstream to flushed batches, acking every flush as soon as it arrives so
//! `max_outstanding` never becomes the bottleneck being measured.

use conveyor::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

const ITEM_COUNTS: &[usize] = &[1_000, 10_000, 100_000];

fn batcher_throughput(c: &mut Criterion) {
    conveyor::dev_tracing::init_tracing();
    let mut group = c.benchmark_group("batcher/throughput");

    // Reuse a single runtime across iterations; compio's io_uring setup has
    // real per-runtime cost.
    let rt = compio::runtime::Runtime::new().unwrap();

    for &count in ITEM_COUNTS {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                rt.block_on(async {
                    let (in_tx, in_rx) = flume::unbounded::<u64>();
                    let (out_tx, out_rx) = flume::unbounded::<Vec<u64>>();
                    let tunables = Tunables::default().with_batch_timers(
                        Duration::from_millis(1),
                        Duration::from_millis(1),
                        Duration::from_millis(1),
                    );
                    let mut batcher =
                        BatcherOperator::new(VecBatchContainer::new(), 64, in_rx, out_tx, &tunables);
                    let notifier = batcher.notifier();

                    let batcher_task = compio::runtime::spawn(async move {
                        batcher.run().await.unwrap();
                    });

                    for i in 0..count as u64 {
                        in_tx.send_async(black_box(i)).await.unwrap();
                    }
                    drop(in_tx);

                    let mut received = 0usize;
                    while let Ok(batch) = out_rx.recv_async().await {
                        received += batch.len();
                        notifier.notify(1);
                    }
                    batcher_task.await;
                    assert_eq!(received, count);
                });
            });
        });
    }
    group.finish();
}

criterion_group!(benches, batcher_throughput);
criterion_main!(benches);
