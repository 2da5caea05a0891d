//! Scenario 3 (spec §8): the batcher's liveness invariant — every accepted
//! item is eventually flushed downstream, whether flushes are forced by a
//! tight `max_outstanding` cap, by the idle timers, or by a soft close that
//! lands mid-batch.

use conveyor::prelude::*;
use std::time::Duration;

#[compio::test]
async fn test_every_item_is_flushed_exactly_once_under_a_tight_outstanding_cap() {
    let (in_tx, in_rx) = flume::unbounded::<i32>();
    let (out_tx, out_rx) = flume::unbounded::<Vec<i32>>();
    let tunables = Tunables::default().with_batch_timers(
        Duration::from_millis(10),
        Duration::from_millis(10),
        Duration::from_millis(10),
    );
    // max_outstanding = 1 forces the batcher to wait for each flush's ack
    // before it may flush again, exercising the DRCB (downstream-ack) arm.
    let mut batcher = BatcherOperator::new(VecBatchContainer::new(), 1, in_rx, out_tx, &tunables);
    let notifier = batcher.notifier();

    let handle = compio::runtime::spawn(async move {
        batcher.run().await.unwrap();
    });

    for i in 0..500 {
        in_tx.send_async(i).await.unwrap();
    }
    drop(in_tx);

    let mut seen = Vec::new();
    while let Ok(batch) = out_rx.recv_async().await {
        seen.extend(batch);
        notifier.notify(1);
    }
    handle.await;

    seen.sort_unstable();
    assert_eq!(seen, (0..500).collect::<Vec<_>>());
}

#[compio::test]
async fn test_idle_timers_flush_a_leftover_partial_batch_without_a_soft_close() {
    let (in_tx, in_rx) = flume::unbounded::<i32>();
    let (out_tx, out_rx) = flume::unbounded::<Vec<i32>>();
    let tunables = Tunables::default().with_batch_timers(
        Duration::from_millis(15),
        Duration::from_millis(15),
        Duration::from_millis(15),
    );
    let mut batcher = BatcherOperator::new(VecBatchContainer::new(), 0, in_rx, out_tx, &tunables);

    let handle = compio::runtime::spawn(async move {
        batcher.run().await.unwrap();
    });

    in_tx.send_async(1).await.unwrap();
    in_tx.send_async(2).await.unwrap();
    in_tx.send_async(3).await.unwrap();

    // No more items arrive; the batcher must flush this partial batch on its
    // own timer rather than waiting indefinitely for a fourth item.
    let batch = out_rx.recv_async().await.unwrap();
    assert_eq!(batch, vec![1, 2, 3]);

    drop(in_tx);
    handle.await;
}

#[compio::test]
async fn test_soft_close_mid_batch_flushes_whatever_is_buffered() {
    let (in_tx, in_rx) = flume::unbounded::<i32>();
    let (out_tx, out_rx) = flume::unbounded::<Vec<i32>>();
    let tunables = Tunables::default();
    let mut batcher = BatcherOperator::new(VecBatchContainer::new(), 0, in_rx, out_tx, &tunables);

    let handle = compio::runtime::spawn(async move {
        batcher.run().await.unwrap();
    });

    in_tx.send_async(1).await.unwrap();
    in_tx.send_async(2).await.unwrap();
    drop(in_tx); // soft close before either the first-item or leftover timer fires

    let batch = out_rx.recv_async().await.unwrap();
    assert_eq!(batch, vec![1, 2]);
    assert!(out_rx.recv_async().await.is_err(), "no further batches after the soft-close flush");

    handle.await;
}
