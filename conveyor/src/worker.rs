//! The `Worker` trait: user-supplied per-item transform logic for a worker
//! pool (spec §4.3).
//!
//! The original runtime's `mapper/worker.go` offers two implementations:
//! `CallbackWorker`, which invokes a user function through `reflect.Value`,
//! and a closure-based variant that avoids reflection. This crate only
//! builds the efficient shape — static dispatch through a trait object,
//! never runtime reflection on the per-item path (spec §9's "generic user
//! callbacks" design note).

use async_trait::async_trait;
use conveyor_core::error::Result;

/// A private staging area a worker pushes its outputs onto.
///
/// Keeping this as an owned buffer rather than handing the worker a live
/// sender lets both pool variants reuse the same [`Worker`] implementation:
/// the unordered pool forwards each pushed item straight onto the shared
/// output bus, while the order-preserving pool holds it in a per-worker
/// staging slot until the combiner's turn to forward it arrives (spec
/// §4.3's "private output staging slot").
#[derive(Debug, Default)]
pub struct WorkerOutput<O> {
    items: Vec<O>,
}

impl<O> WorkerOutput<O> {
    /// Push one result item.
    pub fn push(&mut self, item: O) {
        self.items.push(item);
    }

    /// Drain every staged item in the order it was pushed.
    pub fn drain(&mut self) -> std::vec::Drain<'_, O> {
        self.items.drain(..)
    }

    /// Number of items currently staged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Per-item transform logic run by a worker-pool task.
///
/// One instance is constructed per spawned worker task (see
/// [`WorkerFactory`]); a worker is never shared across tasks, so
/// implementations may hold per-worker mutable state freely.
#[async_trait]
pub trait Worker<I, O>: Send {
    /// Process one input item, pushing zero or more results onto `out`.
    async fn map(&mut self, input: I, out: &mut WorkerOutput<O>) -> Result<()>;

    /// Runs once, on soft close (the pool's shared input queue closed),
    /// after the last `map` call. May emit final items. Default: no-op.
    async fn close(&mut self, _out: &mut WorkerOutput<O>) -> Result<()> {
        Ok(())
    }

    /// Runs once, on hard close (external stop signal fired). Default: no-op.
    ///
    /// Unlike `close`, this does not receive an output handle — per spec
    /// §4.2's hard-close contract, a hard stop may drop in-flight work and
    /// is not expected to emit a final artifact.
    fn stop(&mut self) {}

    /// Runs once after either `close` or `stop`, whichever occurred,
    /// immediately before the worker task exits. Use for releasing
    /// resources the worker itself acquired. Default: no-op.
    fn exit(&mut self) {}
}

/// Produces one fresh [`Worker`] instance per spawned pool task, mirroring
/// `Generator.GetWorker()` in the original `mapper/operator.go`.
pub trait WorkerFactory<I, O>: Send + Sync {
    /// The concrete worker type this factory produces.
    type Worker: Worker<I, O> + 'static;

    /// Construct a new worker instance for one pool task.
    fn create(&self) -> Self::Worker;
}

impl<I, O, W, F> WorkerFactory<I, O> for F
where
    F: Fn() -> W + Send + Sync,
    W: Worker<I, O> + 'static,
{
    type Worker = W;

    fn create(&self) -> W {
        (self)()
    }
}

/// Adapts a plain async closure into a [`Worker`], for the common case where
/// a worker is stateless and needs no `close`/`stop`/`exit` hooks.
pub struct FnWorker<F> {
    f: F,
}

impl<F> FnWorker<F> {
    pub const fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<I, O, F, Fut> Worker<I, O> for FnWorker<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Vec<O>>> + Send,
{
    async fn map(&mut self, item: I, out: &mut WorkerOutput<O>) -> Result<()> {
        for item in (self.f)(item).await? {
            out.push(item);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doubler;

    #[async_trait]
    impl Worker<i32, i32> for Doubler {
        async fn map(&mut self, item: i32, out: &mut WorkerOutput<i32>) -> Result<()> {
            out.push(item * 2);
            Ok(())
        }
    }

    #[compio::test]
    async fn test_worker_trait_object() {
        let mut worker: Box<dyn Worker<i32, i32>> = Box::new(Doubler);
        let mut out = WorkerOutput::default();
        worker.map(21, &mut out).await.unwrap();
        assert_eq!(out.drain().collect::<Vec<_>>(), vec![42]);
    }

    #[compio::test]
    async fn test_fn_worker() {
        let mut worker = FnWorker::new(|item: i32| async move { Ok(vec![item + 1]) });
        let mut out = WorkerOutput::default();
        worker.map(1, &mut out).await.unwrap();
        assert_eq!(out.drain().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_factory_from_closure() {
        fn make() -> impl WorkerFactory<i32, i32> {
            || Doubler
        }
        let factory = make();
        let _worker = factory.create();
    }
}
