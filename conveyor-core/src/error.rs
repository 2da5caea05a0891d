//! Conveyor error types.
//!
//! Comprehensive error handling for all conveyor-core operations.

use std::io;
use thiserror::Error;

/// Main error type for conveyor-core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// IO error during socket or stream operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Frame or wire-level protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Operator or transport endpoint closed while an operation was pending.
    #[error("closed")]
    Closed,

    /// Channel send error (receiver dropped).
    #[error("channel send error")]
    ChannelSend,

    /// Channel receive error (sender dropped).
    #[error("channel receive error")]
    ChannelRecv,

    /// Peer disconnected.
    #[error("peer disconnected: {0}")]
    PeerDisconnected(String),

    /// A caller-controlled invariant was violated (e.g. acking a sequence the
    /// buffer never issued, adding past the configured capacity).
    #[error("programming error: {0}")]
    Programming(String),

    /// Retry budget exhausted. Callers treat this as terminal for the
    /// connection attempt, not necessarily fatal to the whole operator.
    #[error("retries exhausted after {0} attempts")]
    RetriesExhausted(u32),
}

/// Result type alias for conveyor-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create a protocol error with a message.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a programming error with a message.
    pub fn programming(msg: impl Into<String>) -> Self {
        Self::Programming(msg.into())
    }

    /// Create a peer-disconnected error.
    pub fn peer_disconnected(detail: impl Into<String>) -> Self {
        Self::PeerDisconnected(detail.into())
    }

    /// Check if this error is recoverable by retrying the operation.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            Self::PeerDisconnected(_) => true,
            _ => false,
        }
    }

    /// Check if this is a connection-level error (the transport should
    /// attempt a reconnect rather than give up entirely).
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::Closed | Self::PeerDisconnected(_))
    }
}

impl<T> From<flume::SendError<T>> for CoreError {
    fn from(_: flume::SendError<T>) -> Self {
        Self::ChannelSend
    }
}

impl From<flume::RecvError> for CoreError {
    fn from(_: flume::RecvError) -> Self {
        Self::ChannelRecv
    }
}
