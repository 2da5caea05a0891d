//! Wires operators together into a runnable pipeline.
//!
//! Grounded on `stream/chain.go`'s `SimpleChain`: `Add` wires the previous
//! operator's output to the new operator's input and allocates a fresh
//! bounded channel for the new tail, `Wait` blocks on the runner's close
//! notifier then decides whether to report a hard or soft failure, and
//! `Stop`/`HardStop` both delegate to the underlying [`Runner`].
//!
//! Two adaptations from the original:
//!
//! - Go's `interface{}`-typed channels let a chain mix operators of
//!   different input/output shapes at runtime, with type assertions at the
//!   boundary. `Chain<T>` is homogeneous in its item type instead — every
//!   operator in the chain reads and writes the same `T` — the direct,
//!   statically-checked equivalent for pass-through and same-type-transform
//!   pipelines.
//! - The original's `SoftStop` closes the first operator's input channel
//!   outright, regardless of how many other goroutines still hold a sender
//!   to it — Go permits this (and panics if anyone else tries to send
//!   afterwards). Rust channels close only once every sender is dropped, so
//!   [`Chain::close_input`] drops the chain's own retained sender; it is a
//!   true soft-stop only once external producers have dropped theirs too.

use crate::runner::Runner;
use conveyor_core::error::{CoreError, Result};
use conveyor_core::operator::{HasInput, HasOutput, Operator};
use conveyor_core::options::Tunables;
use std::sync::Mutex;

/// A pipeline of operators sharing one item type, connected input to
/// output.
pub struct Chain<T> {
    ops: Vec<Box<dyn Operator>>,
    chan_slack: usize,
    input_tx: Mutex<Option<flume::Sender<T>>>,
    pending_rx: Option<flume::Receiver<T>>,
    output_rx: Option<flume::Receiver<T>>,
    runner: Option<Runner>,
}

impl<T: Send + 'static> Chain<T> {
    /// Create an empty chain with its own bounded entry channel.
    #[must_use]
    pub fn new(tunables: &Tunables) -> Self {
        let (tx, rx) = flume::bounded(tunables.chan_slack);
        Self {
            ops: Vec::new(),
            chan_slack: tunables.chan_slack,
            input_tx: Mutex::new(Some(tx)),
            pending_rx: Some(rx),
            output_rx: None,
            runner: None,
        }
    }

    /// A sender feeding the chain's first operator. Returns `None` once
    /// [`Chain::close_input`] has been called.
    #[must_use]
    pub fn input_sender(&self) -> Option<flume::Sender<T>> {
        self.input_tx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Drop the chain's own retained input sender. Once every external
    /// producer has also dropped its sender, the first operator's `recv`
    /// observes the channel closing and the chain drains to a soft stop.
    pub fn close_input(&self) {
        self.input_tx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
    }

    /// A receiver for the chain's final output. Available only after at
    /// least one operator has been added and the chain has not yet started
    /// (call this before [`Chain::run`]; after that the receiver has
    /// already been claimed for reuse by subsequent `add` calls).
    #[must_use]
    pub fn output_receiver(&mut self) -> Option<flume::Receiver<T>> {
        self.output_rx.take().or_else(|| self.pending_rx.clone())
    }

    /// Append an operator, wiring its input to the chain's current tail and
    /// allocating a new tail channel for its output.
    pub fn add<Op>(&mut self, mut op: Op) -> &mut Self
    where
        Op: Operator + HasInput<T> + HasOutput<T> + 'static,
    {
        let rx = self.pending_rx.take().expect("chain always has a pending receiver");
        op.set_input(rx);
        let (tx, rx) = flume::bounded(self.chan_slack);
        op.set_output(tx);
        self.pending_rx = Some(rx);
        self.ops.push(Box::new(op));
        self
    }

    /// Number of operators currently in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Start every operator concurrently.
    pub fn run(&mut self) {
        self.output_rx = self.pending_rx.clone();
        let ops = std::mem::take(&mut self.ops);
        self.runner = Some(Runner::async_run(ops));
    }

    /// Request every operator abandon in-flight work immediately.
    pub fn hard_stop(&self) {
        if let Some(runner) = &self.runner {
            runner.hard_stop();
        }
    }

    /// Block until the first operator in the chain returns, then decide how
    /// the rest of the chain shuts down: a reported error triggers a hard
    /// stop of every operator, while a clean exit triggers a soft stop
    /// (closing the first operator's input so the close cascades downstream
    /// naturally). Either way, join every operator task before returning.
    ///
    /// # Errors
    ///
    /// Returns whatever error the failing operator reported.
    pub async fn wait(&self) -> Result<()> {
        let Some(runner) = &self.runner else {
            return Err(CoreError::programming("Chain::wait called before Chain::run"));
        };
        runner.wait().await;
        let error = runner.take_error();
        if error.is_some() {
            runner.hard_stop();
        } else {
            self.close_input();
        }
        runner.join().await;
        match error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
