//! Scenario 2 (spec §8): feed 0..1999 through an 8-worker ordered pool where
//! processing time is inversely related to item value (so a naive unordered
//! pool would visibly reorder the stream), and confirm the combiner restores
//! input order exactly.

use conveyor::prelude::*;
use std::time::Duration;

struct VariableDelay;

#[async_trait::async_trait]
impl Worker<i32, i32> for VariableDelay {
    async fn map(&mut self, item: i32, out: &mut WorkerOutput<i32>) -> conveyor_core::error::Result<()> {
        let delay_ms = u64::try_from(item % 7).unwrap_or(0);
        compio::time::sleep(Duration::from_millis(delay_ms)).await;
        out.push(item);
        Ok(())
    }
}

#[compio::test]
async fn test_eight_workers_preserve_acceptance_order_under_variable_delay() {
    let (in_tx, in_rx) = flume::unbounded::<i32>();
    let (out_tx, out_rx) = flume::unbounded::<i32>();
    let mut pool = OrderedPool::new(|| VariableDelay, 8, in_rx, out_tx);

    let input: Vec<i32> = (0..2_000).collect();
    for &i in &input {
        in_tx.send_async(i).await.unwrap();
    }
    drop(in_tx);

    let handle = compio::runtime::spawn(async move {
        pool.run().await.unwrap();
    });

    let mut seen = Vec::new();
    while let Ok(item) = out_rx.recv_async().await {
        seen.push(item);
    }
    handle.await;

    assert_eq!(seen, input, "ordered pool must restore acceptance order regardless of per-item latency");
}

#[compio::test]
async fn test_unordered_pool_preserves_the_full_multiset_without_ordering_guarantees() {
    let (in_tx, in_rx) = flume::unbounded::<i32>();
    let (out_tx, out_rx) = flume::unbounded::<i32>();
    let mut pool = UnorderedPool::new(|| VariableDelay, 8, in_rx, out_tx);

    let input: Vec<i32> = (0..2_000).collect();
    for &i in &input {
        in_tx.send_async(i).await.unwrap();
    }
    drop(in_tx);

    let handle = compio::runtime::spawn(async move {
        pool.run().await.unwrap();
    });

    let mut seen = Vec::new();
    while let Ok(item) = out_rx.recv_async().await {
        seen.push(item);
    }
    handle.await;

    seen.sort_unstable();
    assert_eq!(seen, input);
}
