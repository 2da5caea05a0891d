//! The order-preserving worker-pool variant (spec §4.3).
//!
//! Grounded directly on `mapper/orderpreserving.go`'s `OrderPreservingOp`:
//!
//! - A single-slot accept-lock (`lock chan bool` in the original, a
//!   `flume::bounded(1)` unit token here) serializes the "accept next input"
//!   step across workers.
//! - Each worker owns a private output staging slot (an unbounded channel of
//!   `O`) and a private count channel (how many items it just staged).
//! - A shared work queue records which worker accepted each input, in
//!   acceptance order.
//! - A combiner drains the work queue in order: for each recorded worker id,
//!   it waits for that worker's next count, then forwards exactly that many
//!   items from that worker's staging slot onto the pool's output.
//!
//! Invariant: if worker A accepted its input before worker B accepted its
//! input, every item A produces precedes every item B produces on the
//! output bus — because A's id reaches the work queue (and therefore the
//! combiner) first, regardless of how long A's `map` call takes relative to
//! B's.

use crate::worker::{Worker, WorkerFactory, WorkerOutput};
use async_trait::async_trait;
use conveyor_core::error::Result;
use conveyor_core::operator::{HardStop, HasInput, HasOutput, Operator, StopHandle, StopNotifier};
use futures::FutureExt;
use std::sync::Arc;

/// Runs `worker_count` independent copies of a [`Worker`], restoring input
/// order on the output bus.
pub struct OrderedPool<I, O, F> {
    input: flume::Receiver<I>,
    output: flume::Sender<O>,
    factory: F,
    worker_count: usize,
    stop: StopHandle,
}

impl<I, O, F> OrderedPool<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: WorkerFactory<I, O>,
{
    /// Create a pool that will spin up `worker_count` worker tasks (clamped
    /// to at least 1) plus one combiner task when run.
    #[must_use]
    pub fn new(factory: F, worker_count: usize, input: flume::Receiver<I>, output: flume::Sender<O>) -> Self {
        Self {
            input,
            output,
            factory,
            worker_count: worker_count.max(1),
            stop: StopHandle::new(),
        }
    }
}

#[async_trait]
impl<I, O, F> Operator for OrderedPool<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: WorkerFactory<I, O> + Send + Sync,
{
    async fn run(&mut self) -> Result<()> {
        let worker_count = self.worker_count;

        let (lock_tx, lock_rx) = flume::bounded::<()>(1);
        lock_tx.try_send(()).expect("fresh bounded(1) channel always has room for the seed token");
        let (work_tx, work_rx) = flume::unbounded::<usize>();

        let mut staging_txs = Vec::with_capacity(worker_count);
        let mut staging_rxs = Vec::with_capacity(worker_count);
        let mut count_txs = Vec::with_capacity(worker_count);
        let mut count_rxs = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let (stx, srx) = flume::unbounded::<O>();
            let (ctx, crx) = flume::unbounded::<usize>();
            staging_txs.push(stx);
            staging_rxs.push(srx);
            count_txs.push(ctx);
            count_rxs.push(crx);
        }

        let mut handles = Vec::with_capacity(worker_count);
        for (id, (staging_tx, count_tx)) in staging_txs.into_iter().zip(count_txs).enumerate() {
            let input = self.input.clone();
            let lock_rx = lock_rx.clone();
            let lock_tx = lock_tx.clone();
            let work_tx = work_tx.clone();
            let mut worker = self.factory.create();
            let notifier = self.stop.notifier();
            handles.push(compio::runtime::spawn(async move {
                worker_loop(id, &mut worker, &input, &lock_rx, &lock_tx, &work_tx, &staging_tx, &count_tx, notifier)
                    .await;
            }));
        }
        // Drop the pool's own clones so the shared channels close once every
        // worker task has dropped its own.
        drop(lock_tx);
        drop(lock_rx);
        drop(work_tx);

        combiner_loop(&work_rx, &staging_rxs, &count_rxs, &self.output).await;

        for handle in handles {
            let _ = handle.await;
        }
        Ok(())
    }

    fn hard_stop_handle(&self) -> Arc<HardStop> {
        self.stop.trigger()
    }
}

impl<I, O, F> HasInput<I> for OrderedPool<I, O, F> {
    fn input(&self) -> &flume::Receiver<I> {
        &self.input
    }

    fn set_input(&mut self, input: flume::Receiver<I>) {
        self.input = input;
    }
}

impl<I, O, F> HasOutput<O> for OrderedPool<I, O, F> {
    fn output(&self) -> &flume::Sender<O> {
        &self.output
    }

    fn set_output(&mut self, output: flume::Sender<O>) {
        self.output = output;
    }
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop<I, O, W>(
    id: usize,
    worker: &mut W,
    input: &flume::Receiver<I>,
    lock_rx: &flume::Receiver<()>,
    lock_tx: &flume::Sender<()>,
    work_tx: &flume::Sender<usize>,
    staging_tx: &flume::Sender<O>,
    count_tx: &flume::Sender<usize>,
    stop: StopNotifier,
) where
    W: Worker<I, O>,
{
    loop {
        futures::select! {
            _ = stop.wait().fuse() => {
                worker.stop();
                worker.exit();
                return;
            }
            acquired = lock_rx.recv_async().fuse() => {
                if acquired.is_err() {
                    worker.stop();
                    worker.exit();
                    return;
                }

                match input.recv_async().await {
                    Ok(item) => {
                        // Record acceptance order, then release the lock so
                        // another worker can accept the next input while
                        // this one processes.
                        if work_tx.send_async(id).await.is_err() {
                            let _ = lock_tx.send_async(()).await;
                            worker.stop();
                            worker.exit();
                            return;
                        }
                        let _ = lock_tx.send_async(()).await;

                        let mut out = WorkerOutput::default();
                        if let Err(e) = worker.map(item, &mut out).await {
                            tracing::warn!(worker = id, error = %e, "ordered pool worker map failed");
                        }
                        let produced = out.len();
                        for result in out.drain() {
                            if staging_tx.send_async(result).await.is_err() {
                                worker.stop();
                                worker.exit();
                                return;
                            }
                        }
                        let _ = count_tx.send_async(produced).await;
                    }
                    Err(_) => {
                        // Soft close: record this worker's closing slot so
                        // the combiner still forwards any final items it
                        // emits in the right position, then release the
                        // lock promptly so sibling workers also observe the
                        // closed input without waiting on this one.
                        if work_tx.send_async(id).await.is_err() {
                            let _ = lock_tx.send_async(()).await;
                            worker.exit();
                            return;
                        }
                        let _ = lock_tx.send_async(()).await;

                        let mut out = WorkerOutput::default();
                        if let Err(e) = worker.close(&mut out).await {
                            tracing::warn!(worker = id, error = %e, "ordered pool worker close failed");
                        }
                        let produced = out.len();
                        for result in out.drain() {
                            let _ = staging_tx.send_async(result).await;
                        }
                        let _ = count_tx.send_async(produced).await;
                        worker.exit();
                        return;
                    }
                }
            }
        }
    }
}

async fn combiner_loop<O>(
    work_rx: &flume::Receiver<usize>,
    staging_rxs: &[flume::Receiver<O>],
    count_rxs: &[flume::Receiver<usize>],
    output: &flume::Sender<O>,
) {
    while let Ok(worker_id) = work_rx.recv_async().await {
        let Ok(count) = count_rxs[worker_id].recv_async().await else {
            continue;
        };
        for _ in 0..count {
            match staging_rxs[worker_id].recv_async().await {
                Ok(item) => {
                    if output.send_async(item).await.is_err() {
                        return;
                    }
                }
                Err(_) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Identity;

    #[async_trait]
    impl Worker<i32, i32> for Identity {
        async fn map(&mut self, item: i32, out: &mut WorkerOutput<i32>) -> Result<()> {
            out.push(item);
            Ok(())
        }
    }

    /// A worker whose processing time is inversely related to the item
    /// value, so a naive unordered pool would visibly reorder this input —
    /// exercising the combiner's acceptance-order guarantee under real
    /// interleaving rather than happening to preserve order by luck.
    struct VariableDelay;

    #[async_trait]
    impl Worker<i32, i32> for VariableDelay {
        async fn map(&mut self, item: i32, out: &mut WorkerOutput<i32>) -> Result<()> {
            let delay_ms = u64::try_from(item % 5).unwrap_or(0);
            compio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            out.push(item);
            Ok(())
        }
    }

    #[compio::test]
    async fn test_ordered_pool_preserves_order() {
        let (in_tx, in_rx) = flume::unbounded();
        let (out_tx, out_rx) = flume::unbounded();
        let mut pool = OrderedPool::new(|| VariableDelay, 8, in_rx, out_tx);

        let input: Vec<i32> = (0..2_000).collect();
        for &i in &input {
            in_tx.send_async(i).await.unwrap();
        }
        drop(in_tx);

        compio::runtime::spawn(async move {
            pool.run().await.unwrap();
        })
        .detach();

        let mut seen = Vec::new();
        while let Ok(item) = out_rx.recv_async().await {
            seen.push(item);
        }
        assert_eq!(seen, input);
    }

    #[compio::test]
    async fn test_ordered_pool_single_worker_is_identity() {
        let (in_tx, in_rx) = flume::unbounded();
        let (out_tx, out_rx) = flume::unbounded();
        let mut pool = OrderedPool::new(|| Identity, 1, in_rx, out_tx);

        for i in 0..50 {
            in_tx.send_async(i).await.unwrap();
        }
        drop(in_tx);
        pool.run().await.unwrap();

        let mut seen = Vec::new();
        while let Ok(item) = out_rx.try_recv() {
            seen.push(item);
        }
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }
}
