//! The adaptive batcher (spec §4.4): an operator that accumulates upstream
//! items into a `container` and flushes it downstream under two
//! constraints — an `outstanding` budget fed back by a downstream
//! processed-notifier, and three independent timers.
//!
//! Grounded on `stream/batcher.go` (the state machine), `stream/interfaceBatcher.go`
//! (`BatchContainer`/`VecBatchContainer`'s `RunningCount` capacity-reuse
//! heuristic), and `stream/ProcessedNotifier.go` (`SimpleProcessedNotifier`'s
//! accumulate-on-full non-blocking notify).
//!
//! State table (hi = has items, wcb = will-callback because outstanding is
//! at cap, bne = batch-not-expired):
//!
//! | Event | Action | Resulting timer |
//! |---|---|---|
//! | item arrives (IN) | add; if ¬wcb ∧ hi ∧ timer=nil, arm `wait_after_first_item` | — |
//! | input closed | flush all; return | — |
//! | timer fires (BE) | if can accept, flush and arm `wait_between_flushes`; else arm `wait_for_leftover` | rearmed |
//! | downstream ack (DRCB) | decrement outstanding; if can accept ∧ hi ∧ no timer, flush and arm `wait_between_flushes` | rearmed on flush |
//! | hard stop | return, discarding buffered items | — |
//!
//! Liveness invariant: whenever `has_items()` is true, either a timer is
//! armed or `outstanding` is at cap (guaranteeing a later downstream
//! callback) — every accepted item is eventually flushed, modulo hard stop.

use async_trait::async_trait;
use conveyor_core::error::Result;
use conveyor_core::operator::{HardStop, HasInput, HasOutput, Operator, StopHandle};
use conveyor_core::options::Tunables;
use futures::future::Either;
use futures::FutureExt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Accumulates upstream items and flushes an artifact downstream.
///
/// `add`/`has_items` are synchronous bookkeeping; `flush`/`flush_all` are
/// async because emitting an artifact means sending it on the batcher's
/// output bus, which can itself apply backpressure.
#[async_trait]
pub trait BatchContainer<I, O>: Send
where
    I: Send,
    O: Send,
{
    /// Add one upstream item to the container.
    fn add(&mut self, item: I);

    /// Whether the container currently holds anything unflushed.
    fn has_items(&self) -> bool;

    /// Flush the current contents as a single artifact, if any.
    ///
    /// Returns `true` if an artifact was actually emitted (and thus the
    /// caller's outstanding count should increase); `false` if the
    /// container was empty.
    async fn flush(&mut self, out: &flume::Sender<O>) -> bool;

    /// Flush unconditionally, used on soft close to drain whatever remains.
    /// Default implementation defers to [`BatchContainer::flush`].
    async fn flush_all(&mut self, out: &flume::Sender<O>) -> bool {
        self.flush(out).await
    }
}

/// The default container: push items onto a `Vec`, flush the whole `Vec`
/// once as a single artifact.
///
/// Tracks a running average of emitted batch sizes (`running_count`,
/// grounded on the original's `RunningCount`) so the replacement `Vec`
/// allocated after each flush is pre-sized close to the steady-state batch
/// size instead of starting from zero every time.
pub struct VecBatchContainer<I> {
    items: Vec<I>,
    running_count: f64,
}

impl<I> VecBatchContainer<I> {
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new(), running_count: 0.0 }
    }
}

impl<I> Default for VecBatchContainer<I> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<I: Send> BatchContainer<I, Vec<I>> for VecBatchContainer<I> {
    fn add(&mut self, item: I) {
        self.items.push(item);
    }

    fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    async fn flush(&mut self, out: &flume::Sender<Vec<I>>) -> bool {
        if self.items.is_empty() {
            return false;
        }
        let emitted_len = self.items.len();
        // Exponential moving average, matching the original's running-count
        // smoothing rather than a plain mean over all history.
        self.running_count = self.running_count.mul_add(0.9, emitted_len as f64 * 0.1);
        let next_capacity = self.running_count.ceil() as usize;
        let batch = std::mem::replace(&mut self.items, Vec::with_capacity(next_capacity.max(1)));
        let _ = out.send_async(batch).await;
        true
    }
}

/// A non-blocking, accumulating feedback channel: downstream calls
/// [`ProcessedNotifier::notify`] to report how many flushed artifacts it has
/// fully processed, without ever blocking on the batcher being ready to
/// receive. Grounded on `ProcessedNotifier.go`'s `SimpleProcessedNotifier`:
/// a single-slot channel where a failed non-blocking send drains the
/// existing value and re-sends the accumulated sum.
#[derive(Clone)]
pub struct ProcessedNotifier {
    tx: flume::Sender<u64>,
    rx: flume::Receiver<u64>,
}

impl ProcessedNotifier {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = flume::bounded(1);
        Self { tx, rx }
    }

    /// Report that `n` more flushed artifacts have been fully processed.
    /// Never blocks: if the slot is full, drains it and re-sends the sum.
    pub fn notify(&self, n: u64) {
        match self.tx.try_send(n) {
            Ok(()) => {}
            Err(flume::TrySendError::Full(n)) => {
                let accumulated = self.rx.try_recv().unwrap_or(0) + n;
                let _ = self.tx.try_send(accumulated);
            }
            Err(flume::TrySendError::Disconnected(_)) => {}
        }
    }

    /// Await the next accumulated processed-count report, consuming it.
    pub(crate) async fn recv_next(&self) -> u64 {
        self.rx.recv_async().await.unwrap_or(0)
    }
}

impl Default for ProcessedNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// The batcher's state-machine operator (spec §4.4).
pub struct BatcherOperator<I, O, C> {
    input: flume::Receiver<I>,
    output: flume::Sender<O>,
    container: C,
    notifier: ProcessedNotifier,
    max_outstanding: u64,
    outstanding: u64,
    wait_after_first_item: Duration,
    wait_between_flushes: Duration,
    wait_for_leftover: Duration,
    stop: StopHandle,
    _item: PhantomData<fn(I)>,
}

impl<I, O, C> BatcherOperator<I, O, C>
where
    I: Send + 'static,
    O: Send + 'static,
    C: BatchContainer<I, O>,
{
    /// Build a batcher from the runtime's timer defaults.
    ///
    /// `max_outstanding = 0` means unbounded (Open Question resolution:
    /// the original's `MaxOutstanding == 0 || outstanding < MaxOutstanding`
    /// is carried verbatim — `can_accept_flush` is then unconditionally
    /// true).
    #[must_use]
    pub fn new(
        container: C,
        max_outstanding: u64,
        input: flume::Receiver<I>,
        output: flume::Sender<O>,
        tunables: &Tunables,
    ) -> Self {
        Self {
            input,
            output,
            container,
            notifier: ProcessedNotifier::new(),
            max_outstanding,
            outstanding: 0,
            wait_after_first_item: tunables.batch_wait_after_first_item,
            wait_between_flushes: tunables.batch_wait_between_flushes,
            wait_for_leftover: tunables.batch_wait_for_leftover,
            stop: StopHandle::new(),
            _item: PhantomData,
        }
    }

    /// A handle downstream hands off its processed-count reports through.
    #[must_use]
    pub fn notifier(&self) -> ProcessedNotifier {
        self.notifier.clone()
    }

    fn can_accept_flush(&self) -> bool {
        self.max_outstanding == 0 || self.outstanding < self.max_outstanding
    }
}

#[async_trait]
impl<I, O, C> Operator for BatcherOperator<I, O, C>
where
    I: Send + 'static,
    O: Send + 'static,
    C: BatchContainer<I, O> + Send,
{
    async fn run(&mut self) -> Result<()> {
        let stop_notifier = self.stop.notifier();
        let mut timer_deadline: Option<Instant> = None;

        loop {
            let timer_fut = match timer_deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    Either::Left(compio::time::sleep(remaining))
                }
                None => Either::Right(futures::future::pending::<()>()),
            };

            futures::select! {
                _ = stop_notifier.wait().fuse() => {
                    // Hard stop: discard buffered items, return immediately.
                    return Ok(());
                }
                item = self.input.recv_async().fuse() => {
                    match item {
                        Ok(item) => {
                            self.container.add(item);
                            if self.can_accept_flush() && self.container.has_items() && timer_deadline.is_none() {
                                timer_deadline = Some(Instant::now() + self.wait_after_first_item);
                            }
                        }
                        Err(_) => {
                            self.container.flush_all(&self.output).await;
                            return Ok(());
                        }
                    }
                }
                () = timer_fut.fuse() => {
                    if self.can_accept_flush() {
                        if self.container.flush(&self.output).await {
                            self.outstanding += 1;
                        }
                        timer_deadline = Some(Instant::now() + self.wait_between_flushes);
                    } else {
                        timer_deadline = Some(Instant::now() + self.wait_for_leftover);
                    }
                }
                acked = self.notifier.recv_next().fuse() => {
                    self.outstanding = self.outstanding.saturating_sub(acked);
                    if self.can_accept_flush() && self.container.has_items() && timer_deadline.is_none() {
                        if self.container.flush(&self.output).await {
                            self.outstanding += 1;
                        }
                        timer_deadline = Some(Instant::now() + self.wait_between_flushes);
                    }
                }
            }
        }
    }

    fn hard_stop_handle(&self) -> Arc<HardStop> {
        self.stop.trigger()
    }
}

impl<I, O, C> HasInput<I> for BatcherOperator<I, O, C> {
    fn input(&self) -> &flume::Receiver<I> {
        &self.input
    }

    fn set_input(&mut self, input: flume::Receiver<I>) {
        self.input = input;
    }
}

impl<I, O, C> HasOutput<O> for BatcherOperator<I, O, C> {
    fn output(&self) -> &flume::Sender<O> {
        &self.output
    }

    fn set_output(&mut self, output: flume::Sender<O>) {
        self.output = output;
    }
}
