//! The reliable length-delimited framed transport (spec §4.8, §4.9).
//!
//! A client/server pair over TCP that frames payloads with
//! `conveyor-wire`, assigns sequence numbers, buffers unacknowledged
//! payloads in a [`conveyor_core::buffer::SequentialBuffer`], retries after
//! reconnection, and applies batched server-side acknowledgements with
//! timeout fallback. Gated behind the `transport` feature so the rest of
//! the dataflow runtime has no hard dependency on `conveyor-wire` or a
//! networking stack.

mod client;
mod io;
mod server;

pub use client::ReliableClient;
pub use server::ReliableServer;

/// Sequence number the client stamps on its CLOSE frame.
///
/// The original transport hard-codes this to 100 with no documented
/// rationale (spec §9's open question); preserved verbatim since the wire
/// format treats a CLOSE frame's sequence as arbitrary (spec §6) and no
/// peer depends on it being anything in particular.
pub(crate) const CLOSE_SEQUENCE: u32 = 100;
