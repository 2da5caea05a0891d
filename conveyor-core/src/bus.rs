//! Bounded FIFO channel wrapper used to wire operators together.
//!
//! Every operator's input and output is a `Bus<T>` — a thin pair around a
//! bounded `flume` channel. Keeping sender and receiver bundled together
//! (rather than passing two loose channel halves around) mirrors the
//! original runtime's `BaseIn`/`BaseOut` composition, while `flume`'s
//! natively-clonable receiver is what lets the unordered worker pool share
//! one input queue across tasks without a wrapper `Arc<Mutex<_>>>`.

use crate::error::{CoreError, Result};

/// One end of a bounded operator-to-operator channel.
///
/// `Bus` is deliberately two owned halves rather than a single struct with
/// both a sender and receiver: an operator in the middle of a chain holds an
/// input `Bus<T>` it only ever receives from, and an output `Bus<T>` it only
/// ever sends on. Splitting at construction keeps that asymmetry visible in
/// the type.
#[derive(Debug, Clone)]
pub struct Bus<T> {
    tx: flume::Sender<T>,
    rx: flume::Receiver<T>,
}

impl<T> Bus<T> {
    /// Create a new bounded bus with the given capacity (the channel slack).
    #[must_use]
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = flume::bounded(capacity);
        Self { tx, rx }
    }

    /// Create a new unbounded bus. Used sparingly — chains default to
    /// bounded buses so a slow downstream operator applies backpressure.
    #[must_use]
    pub fn unbounded() -> Self {
        let (tx, rx) = flume::unbounded();
        Self { tx, rx }
    }

    /// The sending half.
    #[must_use]
    pub fn sender(&self) -> flume::Sender<T> {
        self.tx.clone()
    }

    /// The receiving half.
    #[must_use]
    pub fn receiver(&self) -> flume::Receiver<T> {
        self.rx.clone()
    }

    /// Send an item, asynchronously waiting for room if the bus is full.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ChannelSend`] if every receiver has been dropped.
    pub async fn send(&self, item: T) -> Result<()> {
        self.tx.send_async(item).await.map_err(|_| CoreError::ChannelSend)
    }

    /// Receive the next item, waiting for one to arrive.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ChannelRecv`] if every sender has been dropped
    /// and the bus is drained.
    pub async fn recv(&self) -> Result<T> {
        self.rx.recv_async().await.map_err(|_| CoreError::ChannelRecv)
    }

    /// Number of items currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
