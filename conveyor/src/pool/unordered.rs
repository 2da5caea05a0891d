//! The unordered worker-pool variant (spec §4.3): N tasks concurrently
//! receive from a shared input queue and write to a shared output queue,
//! with no guarantee about the relative order of outputs produced by
//! different workers.
//!
//! Grounded on the original `mapper/operator.go`'s `Op.Run`/`runWorker`: a
//! fixed-size pool of goroutines looping `recv -> map -> send` against one
//! shared channel pair. `flume`'s natively multi-consumer `Receiver` makes
//! this a direct clone-the-receiver implementation in Rust — no explicit
//! work-stealing or dispatch logic is needed.

use crate::worker::{Worker, WorkerFactory, WorkerOutput};
use async_trait::async_trait;
use conveyor_core::error::Result;
use conveyor_core::operator::{HardStop, HasInput, HasOutput, Operator, StopHandle, StopNotifier};
use futures::FutureExt;
use std::sync::Arc;

/// Runs `worker_count` independent copies of a [`Worker`] against one shared
/// input/output pair.
pub struct UnorderedPool<I, O, F> {
    input: flume::Receiver<I>,
    output: flume::Sender<O>,
    factory: F,
    worker_count: usize,
    stop: StopHandle,
}

impl<I, O, F> UnorderedPool<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: WorkerFactory<I, O>,
{
    /// Create a pool that will spin up `worker_count` worker tasks (clamped
    /// to at least 1) when run.
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

    /// Decompose back into the worker factory and configured worker count,
    /// discarding the current input/output wiring.
    ///
    /// Used by [`crate::ordered_chain::OrderedChain::add_pool`] to rebuild an
    /// unordered pool as its order-preserving [`super::OrderedPool`]
    /// equivalent before wiring it into a chain — the Rust counterpart to the
    /// original's `MakeOrdered()` (spec §4.7's "ordered chain").
    #[must_use]
    pub fn into_parts(self) -> (F, usize) {
        (self.factory, self.worker_count)
    }
}

#[async_trait]
impl<I, O, F> Operator for UnorderedPool<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: WorkerFactory<I, O> + Send + Sync,
{
    async fn run(&mut self) -> Result<()> {
        let mut handles = Vec::with_capacity(self.worker_count);
        for _ in 0..self.worker_count {
            let input = self.input.clone();
            let output = self.output.clone();
            let mut worker = self.factory.create();
            let notifier = self.stop.notifier();
            handles.push(compio::runtime::spawn(async move {
                worker_loop(&mut worker, &input, &output, notifier).await;
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
        Ok(())
    }

    fn hard_stop_handle(&self) -> Arc<HardStop> {
        self.stop.trigger()
    }
}

impl<I, O, F> HasInput<I> for UnorderedPool<I, O, F> {
    fn input(&self) -> &flume::Receiver<I> {
        &self.input
    }

    fn set_input(&mut self, input: flume::Receiver<I>) {
        self.input = input;
    }
}

impl<I, O, F> HasOutput<O> for UnorderedPool<I, O, F> {
    fn output(&self) -> &flume::Sender<O> {
        &self.output
    }

    fn set_output(&mut self, output: flume::Sender<O>) {
        self.output = output;
    }
}

async fn worker_loop<I, O, W>(
    worker: &mut W,
    input: &flume::Receiver<I>,
    output: &flume::Sender<O>,
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
            item = input.recv_async().fuse() => {
                match item {
                    Ok(item) => {
                        let mut out = WorkerOutput::default();
                        if let Err(e) = worker.map(item, &mut out).await {
                            tracing::warn!(error = %e, "unordered pool worker map failed");
                        }
                        for result in out.drain() {
                            if output.send_async(result).await.is_err() {
                                worker.stop();
                                worker.exit();
                                return;
                            }
                        }
                    }
                    Err(_) => {
                        // Input closed: soft close. Drain any final items,
                        // then exit; the pool's output closes once every
                        // worker's clone of the sender has dropped.
                        let mut out = WorkerOutput::default();
                        if let Err(e) = worker.close(&mut out).await {
                            tracing::warn!(error = %e, "unordered pool worker close failed");
                        }
                        for result in out.drain() {
                            let _ = output.send_async(result).await;
                        }
                        worker.exit();
                        return;
                    }
                }
            }
        }
    }
}
