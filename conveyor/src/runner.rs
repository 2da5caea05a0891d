//! Runs a set of operators concurrently and reports the first failure.
//!
//! Grounded on the original `stream/runner.go`'s `Runner`: one task per
//! operator, a capacity-one error slot that only ever keeps the first
//! failure, and a close notifier that fires on the *first* operator to
//! return — not the last — guarded the same way the original guards it:
//! `select { case <-r.closenotifier: default: close(...) }`, so a second or
//! third operator returning afterward is a no-op rather than a panic on a
//! closed channel.
//!
//! First-exit, not last-exit, is deliberate: a chain under normal operation
//! closes from the front (soft close cascades operator by operator) so
//! operators finish in close succession anyway, but an operator that exits
//! *unexpectedly early* — a crash, a broken connection — is the signal the
//! rest of the chain needs to react to immediately, not once everything
//! else has also ground to a halt waiting on a queue that will never drain.

use conveyor_core::error::CoreError;
use conveyor_core::operator::{HardStop, Operator, StopNotifier};
use std::sync::{Arc, Mutex};

/// Owns the concurrent execution of a set of operators, some or all of which
/// may be added incrementally after construction (e.g. a distributor
/// spinning up a new branch per key), mirroring the original's `Runner.Add`
/// plus `Runner.AsyncRun` called separately per operator.
pub struct Runner {
    op_triggers: Mutex<Vec<Arc<HardStop>>>,
    close: Arc<HardStop>,
    close_notifier: StopNotifier,
    error: Arc<Mutex<Option<CoreError>>>,
    handles: Mutex<Vec<compio::runtime::Task<()>>>,
}

impl Runner {
    /// An empty runner with no operators yet, suitable for incremental
    /// [`Runner::spawn`] calls (the close-notifier does not fire for an
    /// empty runner — unlike [`Runner::async_run`] — since more operators
    /// are expected to arrive).
    #[must_use]
    pub fn new() -> Self {
        let (close, close_notifier) = HardStop::new();
        Self {
            op_triggers: Mutex::new(Vec::new()),
            close: Arc::new(close),
            close_notifier,
            error: Arc::new(Mutex::new(None)),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn every operator's `run` loop as an independent task. Returns
    /// immediately; use [`Runner::wait`] to block until the first operator
    /// returns, and [`Runner::join`] to block until every task has.
    #[must_use]
    pub fn async_run(ops: Vec<Box<dyn Operator>>) -> Self {
        let runner = Self::new();
        if ops.is_empty() {
            runner.close.stop();
        }
        for op in ops {
            runner.spawn(op);
        }
        runner
    }

    /// Add one more operator to an already-running runner, mirroring the
    /// original's `Runner.Add` followed immediately by `Runner.AsyncRun`.
    pub fn spawn(&self, mut op: Box<dyn Operator>) {
        self.op_triggers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(op.hard_stop_handle());

        let error = self.error.clone();
        let close = self.close.clone();
        let handle = compio::runtime::spawn(async move {
            let name = op.name();
            if let Err(e) = op.run().await {
                tracing::warn!(operator = name, error = %e, "operator exited with error");
                let mut guard = error.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                if guard.is_none() {
                    *guard = Some(e);
                }
            }
            // Idempotent: whichever operator returns first fires this;
            // every later return finds it already stopped.
            close.stop();
        });
        self.handles
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(handle);
    }

    /// Immediately signal every operator to abandon in-flight work.
    pub fn hard_stop(&self) {
        for trigger in &*self.op_triggers.lock().unwrap_or_else(std::sync::PoisonError::into_inner) {
            trigger.stop();
        }
    }

    /// Resolves as soon as the first operator returns, whether cleanly or
    /// with an error. Callers inspect [`Runner::take_error`] afterward to
    /// decide whether the remaining operators should be hard-stopped or
    /// allowed to drain via soft close.
    pub async fn wait(&self) {
        self.close_notifier.wait().await;
    }

    /// Block until every spawned operator task has actually returned.
    /// Called after [`Runner::wait`] resolves and the caller has decided
    /// how to shut down the rest of the chain.
    pub async fn join(&self) {
        let handles = std::mem::take(
            &mut *self.handles.lock().unwrap_or_else(std::sync::PoisonError::into_inner),
        );
        for handle in handles {
            handle.await;
        }
    }

    /// Whether the first operator has returned.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.close.is_stopped()
    }

    /// Take the first error reported by any operator, if any.
    pub fn take_error(&self) -> Option<CoreError> {
        self.error
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}
