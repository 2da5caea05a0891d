//! Distributor (spec §4.5): one input, routed to per-key child operators
//! created lazily on first appearance of each key. Grounded directly on
//! `stream/distributor.go`'s `DistributeOperator`.
//!
//! Unlike [`crate::fanout::FanoutOperator`], which spins up every child up
//! front, a distributor's children are spawned one at a time as new keys
//! appear — hence [`crate::runner::Runner::spawn`] rather than
//! `Runner::async_run`.

use crate::runner::Runner;
use async_trait::async_trait;
use conveyor_core::error::{CoreError, Result};
use conveyor_core::operator::{HardStop, HasInput, Operator, StopHandle};
use conveyor_core::options::Tunables;
use futures::FutureExt;
use hashbrown::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Routes each upstream item to a per-key child operator, creating the
/// child on first appearance of its key.
pub struct DistributorOperator<T, K, M, C> {
    input: flume::Receiver<T>,
    mapper: M,
    branch_creator: C,
    outputs: HashMap<K, flume::Sender<T>>,
    runner: Runner,
    chan_slack: usize,
    stop: StopHandle,
}

impl<T, K, M, C, Op> DistributorOperator<T, K, M, C>
where
    T: Send + 'static,
    K: Eq + Hash + Clone + Send + 'static,
    M: Fn(&T) -> K + Send,
    C: Fn(&K) -> Op + Send,
    Op: Operator + HasInput<T> + 'static,
{
    /// `mapper` assigns each item a routing key; `branch_creator` builds a
    /// fresh child operator the first time a key is seen.
    #[must_use]
    pub fn new(input: flume::Receiver<T>, mapper: M, branch_creator: C, tunables: &Tunables) -> Self {
        Self {
            input,
            mapper,
            branch_creator,
            outputs: HashMap::new(),
            runner: Runner::new(),
            chan_slack: tunables.chan_slack,
            stop: StopHandle::new(),
        }
    }

    async fn route(&mut self, item: T) -> Result<()> {
        let key = (self.mapper)(&item);
        if !self.outputs.contains_key(&key) {
            let mut child = (self.branch_creator)(&key);
            let (tx, rx) = flume::bounded(self.chan_slack);
            child.set_input(rx);
            self.outputs.insert(key.clone(), tx);
            self.runner.spawn(Box::new(child));
        }
        let sender = self.outputs.get(&key).expect("just inserted or already present");
        let _ = sender.send_async(item).await;
        Ok(())
    }
}

#[async_trait]
impl<T, K, M, C, Op> Operator for DistributorOperator<T, K, M, C>
where
    T: Send + 'static,
    K: Eq + Hash + Clone + Send + 'static,
    M: Fn(&T) -> K + Send,
    C: Fn(&K) -> Op + Send,
    Op: Operator + HasInput<T> + 'static,
{
    async fn run(&mut self) -> Result<()> {
        let stop_notifier = self.stop.notifier();

        loop {
            futures::select! {
                _ = stop_notifier.wait().fuse() => {
                    self.runner.hard_stop();
                    self.runner.join().await;
                    return Ok(());
                }
                item = self.input.recv_async().fuse() => {
                    match item {
                        Ok(item) => {
                            self.route(item).await?;
                        }
                        Err(_) => {
                            // Soft close: drop every branch's sender so each
                            // child observes its own input closing.
                            self.outputs.clear();
                            self.runner.join().await;
                            return Ok(());
                        }
                    }
                }
                () = self.runner.wait().fuse() => {
                    tracing::error!("unexpected child close in distributor operator");
                    self.runner.hard_stop();
                    self.runner.join().await;
                    return Err(CoreError::programming("unexpected child close in distributor operator"));
                }
            }
        }
    }

    fn hard_stop_handle(&self) -> Arc<HardStop> {
        self.stop.trigger()
    }
}

impl<T, K, M, C> HasInput<T> for DistributorOperator<T, K, M, C> {
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
    async fn test_distributor_routes_by_key_and_creates_branches_lazily() {
        let tunables = Tunables::default();
        let (in_tx, in_rx) = flume::bounded(16);

        let even: StdArc<std::sync::Mutex<Vec<i32>>> = StdArc::new(std::sync::Mutex::new(Vec::new()));
        let odd: StdArc<std::sync::Mutex<Vec<i32>>> = StdArc::new(std::sync::Mutex::new(Vec::new()));
        let even_for_creator = even.clone();
        let odd_for_creator = odd.clone();

        let mapper = |item: &i32| item % 2 == 0;
        let creator = move |key: &bool| {
            let (_dummy_tx, dummy_rx) = flume::bounded(1);
            let output = if *key { even_for_creator.clone() } else { odd_for_creator.clone() };
            Collector { input: dummy_rx, output, stop: StopHandle::new() }
        };

        let mut distributor = DistributorOperator::new(in_rx, mapper, creator, &tunables);

        for i in 0..10 {
            in_tx.send_async(i).await.unwrap();
        }
        drop(in_tx);

        distributor.run().await.unwrap();
        assert_eq!(*even.lock().unwrap(), vec![0, 2, 4, 6, 8]);
        assert_eq!(*odd.lock().unwrap(), vec![1, 3, 5, 7, 9]);
    }
}
