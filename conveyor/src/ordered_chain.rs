//! `OrderedChain`: a [`Chain`] variant that automatically upgrades any
//! unordered worker pool added to it into its order-preserving equivalent
//! before wiring it in (spec §4.7: "an ordered chain automatically wraps any
//! parallelizable operator into its order-preserving variant before adding
//! it").
//!
//! Grounded on `stream/chain.go`'s `OrderedChain.Add`, which type-asserts its
//! argument against `ParallelizableOperator` at runtime and calls
//! `MakeOrdered()` when the operator isn't already ordered. Rust's static
//! dispatch has no direct equivalent to that runtime downcast — rather than
//! threading an `Any`-based check through every operator type this crate
//! defines, [`OrderedChain`] gives the one operator that actually has both an
//! ordered and an unordered shape ([`UnorderedPool`]/[`OrderedPool`]) its own
//! entry point, [`OrderedChain::add_pool`]; every other operator goes through
//! the unchanged [`OrderedChain::add`], since there's no ordered variant to
//! upgrade it to.
//!
//! The original's `InChain` (a thin wrapper exposing the first operator's raw
//! input channel as `In()`/`SetIn()`) has no separate type here:
//! [`Chain::input_sender`] already exposes exactly that, on both `Chain` and
//! `OrderedChain`, so wrapping it again would just be forwarding the same
//! method under a different name.

use crate::chain::Chain;
use crate::pool::{OrderedPool, UnorderedPool};
use crate::worker::WorkerFactory;
use conveyor_core::error::Result;
use conveyor_core::operator::{HasInput, HasOutput, Operator};
use conveyor_core::options::Tunables;

/// A pipeline of operators sharing one item type, where unordered worker
/// pools are upgraded to their order-preserving variant as they're added.
pub struct OrderedChain<T> {
    inner: Chain<T>,
}

impl<T: Send + 'static> OrderedChain<T> {
    /// Create an empty ordered chain with its own bounded entry channel.
    #[must_use]
    pub fn new(tunables: &Tunables) -> Self {
        Self { inner: Chain::new(tunables) }
    }

    /// A sender feeding the chain's first operator. Returns `None` once
    /// [`OrderedChain::close_input`] has been called.
    #[must_use]
    pub fn input_sender(&self) -> Option<flume::Sender<T>> {
        self.inner.input_sender()
    }

    /// Drop the chain's own retained input sender, starting a soft stop once
    /// every external producer has also dropped theirs.
    pub fn close_input(&self) {
        self.inner.close_input();
    }

    /// A receiver for the chain's final output. Call before
    /// [`OrderedChain::run`].
    #[must_use]
    pub fn output_receiver(&mut self) -> Option<flume::Receiver<T>> {
        self.inner.output_receiver()
    }

    /// Number of operators currently in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Append an operator with no ordered/unordered distinction, unchanged.
    pub fn add<Op>(&mut self, op: Op) -> &mut Self
    where
        Op: Operator + HasInput<T> + HasOutput<T> + 'static,
    {
        self.inner.add(op);
        self
    }

    /// Append an unordered worker pool, automatically upgraded to its
    /// order-preserving equivalent before it's wired in.
    pub fn add_pool<F>(&mut self, pool: UnorderedPool<T, T, F>) -> &mut Self
    where
        F: WorkerFactory<T, T> + Send + Sync + 'static,
    {
        let (factory, worker_count) = pool.into_parts();
        // `Chain::add` immediately overwrites both ends via `set_input`/
        // `set_output`; these are throwaway placeholders.
        let (_discard_tx, placeholder_rx) = flume::bounded(1);
        let (placeholder_tx, _discard_rx) = flume::bounded(1);
        let ordered = OrderedPool::new(factory, worker_count, placeholder_rx, placeholder_tx);
        self.inner.add(ordered);
        self
    }

    /// Start every operator concurrently.
    pub fn run(&mut self) {
        self.inner.run();
    }

    /// Request every operator abandon in-flight work immediately.
    pub fn hard_stop(&self) {
        self.inner.hard_stop();
    }

    /// Block until the chain decides how to shut down and every operator
    /// task has joined.
    ///
    /// # Errors
    ///
    /// Returns whatever error the failing operator reported.
    pub async fn wait(&self) -> Result<()> {
        self.inner.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::{FnWorker, WorkerOutput};

    #[compio::test]
    async fn test_add_pool_upgrades_to_order_preserving_under_variable_delay() {
        let tunables = Tunables::default();
        let mut chain: OrderedChain<i32> = OrderedChain::new(&tunables);

        let (_tx, rx) = flume::bounded(1);
        let (tx, _rx) = flume::bounded(1);
        let pool = UnorderedPool::new(
            || {
                FnWorker::new(|item: i32| async move {
                    let delay_ms = u64::try_from(item % 5).unwrap_or(0);
                    compio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                    Ok(vec![item])
                })
            },
            8,
            rx,
            tx,
        );
        chain.add_pool(pool);

        let input = chain.input_sender().unwrap();
        let output = chain.output_receiver().unwrap();
        chain.run();

        let items: Vec<i32> = (0..500).collect();
        for &i in &items {
            input.send_async(i).await.unwrap();
        }
        chain.close_input();
        drop(input);

        let mut seen = Vec::new();
        while let Ok(item) = output.recv_async().await {
            seen.push(item);
        }
        chain.wait().await.unwrap();

        assert_eq!(seen, items, "add_pool must restore acceptance order despite per-item delay variance");
    }

    #[compio::test]
    async fn test_add_passes_non_pool_operators_through_unchanged() {
        use async_trait::async_trait;
        use conveyor_core::operator::{HardStop, StopHandle};
        use std::sync::Arc;

        struct PassThrough {
            input: flume::Receiver<i32>,
            output: flume::Sender<i32>,
            stop: StopHandle,
        }

        #[async_trait]
        impl Operator for PassThrough {
            async fn run(&mut self) -> Result<()> {
                while let Ok(item) = self.input.recv_async().await {
                    if self.output.send_async(item).await.is_err() {
                        return Ok(());
                    }
                }
                Ok(())
            }

            fn hard_stop_handle(&self) -> Arc<HardStop> {
                self.stop.trigger()
            }
        }

        impl HasInput<i32> for PassThrough {
            fn input(&self) -> &flume::Receiver<i32> {
                &self.input
            }
            fn set_input(&mut self, input: flume::Receiver<i32>) {
                self.input = input;
            }
        }

        impl HasOutput<i32> for PassThrough {
            fn output(&self) -> &flume::Sender<i32> {
                &self.output
            }
            fn set_output(&mut self, output: flume::Sender<i32>) {
                self.output = output;
            }
        }

        let (tx, rx) = flume::bounded(1);
        let tunables = Tunables::default();
        let mut chain: OrderedChain<i32> = OrderedChain::new(&tunables);
        chain.add(PassThrough { input: rx, output: tx, stop: StopHandle::new() });

        let input = chain.input_sender().unwrap();
        let output = chain.output_receiver().unwrap();
        chain.run();

        input.send_async(1).await.unwrap();
        chain.close_input();
        drop(input);

        assert_eq!(output.recv_async().await.unwrap(), 1);
        chain.wait().await.unwrap();
    }
}
