//! The operator lifecycle contract.
//!
//! An operator is anything that can be wired into a chain: it owns a `run`
//! loop that drains its input bus, does work, and pushes onto its output
//! bus, until either its input closes or it is hard-stopped from outside.
//!
//! This mirrors the original runtime's `Operator` interface (`Run`/`Stop`)
//! and `HardStopChannelCloser`, translated from Go's implicit-interface
//! duck typing into explicit capability traits: `HasInput`/`HasOutput`
//! instead of embedding `BaseIn`/`BaseOut` and relying on method promotion.

use crate::error::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Lifecycle state of a running operator, for observability only — nothing
/// in the runtime branches on this besides logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// A one-shot hard-stop signal, broadcast to every clone of its
/// [`StopNotifier`] by closing the underlying channel.
///
/// The original's `HardStopChannelCloser` closes a `chan bool`; every
/// goroutine selecting on it observes the close simultaneously. The Rust
/// equivalent drops the channel's sender — every `StopNotifier::wait()`
/// then resolves because `recv_async` on a sender-less channel returns
/// immediately.
#[derive(Debug)]
pub struct HardStop {
    tx: Mutex<Option<flume::Sender<std::convert::Infallible>>>,
    stopped: AtomicBool,
}

impl HardStop {
    /// Create a new hard-stop handle and its notifier.
    #[must_use]
    pub fn new() -> (Self, StopNotifier) {
        let (tx, rx) = flume::bounded(0);
        (
            Self {
                tx: Mutex::new(Some(tx)),
                stopped: AtomicBool::new(false),
            },
            StopNotifier { rx },
        )
    }

    /// Trigger the stop signal. Idempotent: calling this more than once has
    /// no further effect.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.tx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
    }

    /// Whether [`HardStop::stop`] has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Default for HardStop {
    fn default() -> Self {
        Self::new().0
    }
}

/// A clonable handle an operator's `run` loop selects on to learn when it
/// should stop immediately, abandoning any in-flight item.
#[derive(Debug, Clone)]
pub struct StopNotifier {
    rx: flume::Receiver<std::convert::Infallible>,
}

impl StopNotifier {
    /// Resolves once the paired [`HardStop::stop`] has been called.
    pub async fn wait(&self) {
        // The channel carries no values; any outcome (closed or otherwise)
        // means the signal fired.
        let _ = self.rx.recv_async().await;
    }
}

/// Gives a concrete operator its own hard-stop handle and notifier pair,
/// mirroring the original's embedded `HardStopChannelCloser` — every
/// operator owns one, rather than the chain holding a single shared signal
/// for the whole run.
#[derive(Clone)]
pub struct StopHandle {
    hard_stop: Arc<HardStop>,
    notifier: StopNotifier,
}

impl StopHandle {
    /// Create a fresh, independent stop handle.
    #[must_use]
    pub fn new() -> Self {
        let (hard_stop, notifier) = HardStop::new();
        Self { hard_stop: Arc::new(hard_stop), notifier }
    }

    /// A clonable trigger the chain runner holds on to and fires on hard
    /// stop.
    #[must_use]
    pub fn trigger(&self) -> Arc<HardStop> {
        self.hard_stop.clone()
    }

    /// The notifier this operator's own `run` loop selects on.
    #[must_use]
    pub fn notifier(&self) -> StopNotifier {
        self.notifier.clone()
    }
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Capability trait for an operator that reads from an input.
///
/// Deliberately holds only the receiving half of a channel (not a
/// [`Bus`]): an operator that also retained a sender clone of its own input
/// would keep that channel open even after every external producer dropped
/// its handle, defeating the soft-stop-by-closing-the-channel pattern the
/// chain runtime relies on.
pub trait HasInput<T> {
    /// The operator's input receiver.
    fn input(&self) -> &flume::Receiver<T>;

    /// Rewire the operator's input, used when a chain splices operators
    /// together.
    fn set_input(&mut self, input: flume::Receiver<T>);
}

/// Capability trait for an operator that writes to an output.
///
/// Holds only the sending half, for the same reason [`HasInput`] holds only
/// the receiving half.
pub trait HasOutput<T> {
    /// The operator's output sender.
    fn output(&self) -> &flume::Sender<T>;

    /// Rewire the operator's output.
    fn set_output(&mut self, output: flume::Sender<T>);
}

/// An operator in a dataflow chain.
///
/// `run` is expected to loop until its input closes (a soft stop — drain
/// what's left, then return) or its [`StopNotifier`] fires (a hard stop —
/// abandon in-flight work and return promptly). Both are normal,
/// non-error returns; `Err` is reserved for conditions the operator cannot
/// recover from on its own.
#[async_trait]
pub trait Operator: Send {
    /// Run the operator until its input is exhausted or it is hard-stopped.
    async fn run(&mut self) -> Result<()>;

    /// This operator's own hard-stop trigger, collected by the runner
    /// before the operator is moved into its task so a later
    /// `Runner::hard_stop` can still reach it.
    fn hard_stop_handle(&self) -> Arc<HardStop>;

    /// A human-readable name for logging, defaulting to the operator's type
    /// name (the closest Rust equivalent to the original's
    /// reflection-based `Name()` helper).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
