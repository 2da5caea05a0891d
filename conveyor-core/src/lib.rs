//! Conveyor core
//!
//! Transport-agnostic primitives for the conveyor dataflow runtime:
//! - Bounded operator-to-operator channels (`bus`)
//! - The operator lifecycle contract: `Operator`, `HardStop`, `HasInput`/`HasOutput` (`operator`)
//! - Zero-copy byte reassembly and the ack-cumulative sequential buffer (`buffer`)
//! - Runtime tunables (`options`)
//! - Reconnect bookkeeping (`reconnect`)
//! - TCP socket tuning (`tcp`)
//! - Endpoint addressing (`endpoint`)
//! - Cancellation-safety guard for multi-step writes (`poison`)
//! - Lifecycle event streams (`events`)
//! - Error types (`error`)

#![deny(unsafe_code)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]

pub mod bus;
pub mod buffer;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod operator;
pub mod options;
pub mod poison;
pub mod reconnect;
pub mod tcp;

/// A small prelude to make downstream crates ergonomic. Kept minimal to
/// avoid API lock-in.
pub mod prelude {
    pub use crate::bus::Bus;
    pub use crate::buffer::{SegmentedBuffer, SequentialBuffer};
    pub use crate::endpoint::Endpoint;
    pub use crate::error::{CoreError, Result};
    pub use crate::events::{event_channel, EventReceiver, EventSender, OperatorEvent};
    pub use crate::operator::{
        HardStop, HasInput, HasOutput, Operator, OperatorState, StopHandle, StopNotifier,
    };
    pub use crate::options::Tunables;
    pub use crate::reconnect::RetryState;
}
