//! # conveyor-wire
//!
//! **Internal protocol implementation crate for conveyor.**
//!
//! This crate provides the sans-IO wire codec for the reliable length-
//! delimited transport: a fixed `u32` length prefix, a `u32` command, a
//! `u32` sequence number, and an opaque payload. For application
//! development, use the `conveyor` crate, whose `transport` module drives
//! this codec over real sockets.
//!
//! ## Wire format
//!
//! ```text
//! +-----------+-----------+-----------+---------+
//! | length:u32| command:u32| seq:u32  | payload |
//! +-----------+-----------+-----------+---------+
//! ```
//!
//! `length` covers everything after itself (command + sequence + payload).
//! Three commands exist: `DATA`, `ACK`, `CLOSE`.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod decoder;
pub mod frame;

pub use decoder::FrameDecoder;
pub use frame::{Command, Frame, FrameError};

/// Prelude module for convenient imports.
///
/// ```rust
/// use conveyor_wire::prelude::*;
/// ```
pub mod prelude {
    pub use crate::decoder::FrameDecoder;
    pub use crate::frame::{Command, Frame, FrameError};
    pub use bytes::Bytes;
}
