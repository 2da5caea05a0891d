//! Fan-out (spec §4.5): one input, replicated to every child operator's own
//! input queue. Grounded directly on `stream/fanout.go`'s `FanoutOperator`.
//!
//! Child operator lifetimes are managed through a [`Runner`] exactly as the
//! original does (`op.runner.AsyncRunAll()` / `op.runner.CloseNotifier()`):
//! an unexpected child exit is fatal for the whole fan-out, and a hard stop
//! propagates to every child before this operator returns.

use crate::runner::Runner;
use async_trait::async_trait;
use conveyor_core::error::{CoreError, Result};
use conveyor_core::operator::{HardStop, HasInput, Operator, StopHandle};
use conveyor_core::options::Tunables;
use futures::FutureExt;
use std::sync::Arc;

/// Replicates every upstream item onto each of its children's input queues.
pub struct FanoutOperator<T> {
    input: flume::Receiver<T>,
    outputs: Vec<flume::Sender<T>>,
    children: Vec<Box<dyn Operator>>,
    chan_slack: usize,
    stop: StopHandle,
}

impl<T: Send + Clone + 'static> FanoutOperator<T> {
    /// Create an empty fan-out reading from `input`.
    #[must_use]
    pub fn new(input: flume::Receiver<T>, tunables: &Tunables) -> Self {
        Self {
            input,
            outputs: Vec::new(),
            children: Vec::new(),
            chan_slack: tunables.chan_slack,
            stop: StopHandle::new(),
        }
    }

    /// Add a child operator, allocating its own input queue fed by a clone
    /// of every item this fan-out receives.
    pub fn add<Op>(&mut self, mut child: Op) -> &mut Self
    where
        Op: Operator + HasInput<T> + 'static,
    {
        let (tx, rx) = flume::bounded(self.chan_slack);
        child.set_input(rx);
        self.outputs.push(tx);
        self.children.push(Box::new(child));
        self
    }

    /// Number of children currently attached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

#[async_trait]
impl<T: Send + Clone + 'static> Operator for FanoutOperator<T> {
    async fn run(&mut self) -> Result<()> {
        let stop_notifier = self.stop.notifier();
        let children = std::mem::take(&mut self.children);
        let runner = Runner::async_run(children);

        loop {
            futures::select! {
                _ = stop_notifier.wait().fuse() => {
                    runner.hard_stop();
                    runner.join().await;
                    return Ok(());
                }
                item = self.input.recv_async().fuse() => {
                    match item {
                        Ok(item) => {
                            for out in &self.outputs {
                                let _ = out.send_async(item.clone()).await;
                            }
                        }
                        Err(_) => {
                            // Soft close: drop every output sender so each
                            // child observes its own input closing, then
                            // let the close cascade through naturally.
                            self.outputs.clear();
                            runner.join().await;
                            return Ok(());
                        }
                    }
                }
                () = runner.wait().fuse() => {
                    tracing::error!("unexpected child close in fanout operator");
                    runner.hard_stop();
                    runner.join().await;
                    return Err(CoreError::programming("unexpected child close in fanout operator"));
                }
            }
        }
    }

    fn hard_stop_handle(&self) -> Arc<HardStop> {
        self.stop.trigger()
    }
}

impl<T> HasInput<T> for FanoutOperator<T> {
    fn input(&self) -> &flume::Receiver<T> {
        &self.input
    }

    fn set_input(&mut self, input: flume::Receiver<T>) {
        self.input = input;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;

    struct Collector {
        input: flume::Receiver<i32>,
        output: StdArc<std::sync::Mutex<Vec<i32>>>,
        stop: StopHandle,
    }

    #[async_trait]
    impl Operator for Collector {
        async fn run(&mut self) -> Result<()> {
            while let Ok(item) = self.input.recv_async().await {
                self.output.lock().unwrap().push(item);
            }
            Ok(())
        }

        fn hard_stop_handle(&self) -> Arc<HardStop> {
            self.stop.trigger()
        }
    }

    impl HasInput<i32> for Collector {
        fn input(&self) -> &flume::Receiver<i32> {
            &self.input
        }
        fn set_input(&mut self, input: flume::Receiver<i32>) {
            self.input = input;
        }
    }

    #[compio::test]
    async fn test_fanout_replicates_to_every_child() {
        let tunables = Tunables::default();
        let (in_tx, in_rx) = flume::bounded(16);
        let mut fanout = FanoutOperator::new(in_rx, &tunables);

        let (_dummy_tx, dummy_rx) = flume::bounded(1);
        let seen_a = StdArc::new(std::sync::Mutex::new(Vec::new()));
        let seen_b = StdArc::new(std::sync::Mutex::new(Vec::new()));
        fanout.add(Collector { input: dummy_rx.clone(), output: seen_a.clone(), stop: StopHandle::new() });
        fanout.add(Collector { input: dummy_rx, output: seen_b.clone(), stop: StopHandle::new() });
        assert_eq!(fanout.len(), 2);

        for i in 0..5 {
            in_tx.send_async(i).await.unwrap();
        }
        drop(in_tx);

        fanout.run().await.unwrap();
        assert_eq!(*seen_a.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(*seen_b.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[compio::test]
    async fn test_fanout_unexpected_child_exit_is_fatal() {
        let tunables = Tunables::default();
        let (_in_tx, in_rx) = flume::bounded(16);
        let mut fanout = FanoutOperator::new(in_rx, &tunables);

        struct ExitsImmediately {
            input: flume::Receiver<i32>,
            stop: StopHandle,
        }
        #[async_trait]
        impl Operator for ExitsImmediately {
            async fn run(&mut self) -> Result<()> {
                Ok(())
            }
            fn hard_stop_handle(&self) -> Arc<HardStop> {
                self.stop.trigger()
            }
        }
        impl HasInput<i32> for ExitsImmediately {
            fn input(&self) -> &flume::Receiver<i32> {
                &self.input
            }
            fn set_input(&mut self, input: flume::Receiver<i32>) {
                self.input = input;
            }
        }

        let (_dummy_tx, dummy_rx) = flume::bounded(1);
        fanout.add(ExitsImmediately { input: dummy_rx, stop: StopHandle::new() });

        let result = fanout.run().await;
        assert!(result.is_err());
    }
}
