//! Operator and transport lifecycle event monitoring.
//!
//! Provides an event stream for observing chain lifecycle events —
//! connections, disconnections, errors — without coupling operators to a
//! specific logging backend.

use crate::endpoint::Endpoint;
use std::fmt;

/// Lifecycle events emitted by operators and the transport.
#[derive(Debug, Clone)]
pub enum OperatorEvent {
    /// The transport client successfully connected to a peer.
    Connected(Endpoint),

    /// The transport client disconnected from a peer.
    Disconnected(Endpoint),

    /// The transport server successfully bound to an endpoint.
    Bound(Endpoint),

    /// Bind operation failed.
    BindFailed { endpoint: Endpoint, reason: String },

    /// Connection attempt failed.
    ConnectFailed { endpoint: Endpoint, reason: String },

    /// The transport server accepted a new incoming connection.
    Accepted(Endpoint),

    /// An operator entered its running state.
    OperatorStarted { name: String },

    /// An operator stopped, cleanly or otherwise.
    OperatorStopped { name: String },
}

impl fmt::Display for OperatorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected(ep) => write!(f, "connected to {ep}"),
            Self::Disconnected(ep) => write!(f, "disconnected from {ep}"),
            Self::Bound(ep) => write!(f, "bound to {ep}"),
            Self::BindFailed { endpoint, reason } => {
                write!(f, "bind failed for {endpoint}: {reason}")
            }
            Self::ConnectFailed { endpoint, reason } => {
                write!(f, "connect failed for {endpoint}: {reason}")
            }
            Self::Accepted(ep) => write!(f, "accepted connection from {ep}"),
            Self::OperatorStarted { name } => write!(f, "operator {name} started"),
            Self::OperatorStopped { name } => write!(f, "operator {name} stopped"),
        }
    }
}

/// Handle for receiving lifecycle events.
pub type EventReceiver = flume::Receiver<OperatorEvent>;

/// Handle for emitting lifecycle events.
pub type EventSender = flume::Sender<OperatorEvent>;

/// Create a new unbounded event channel pair.
#[must_use]
pub fn event_channel() -> (EventSender, EventReceiver) {
    flume::unbounded()
}
