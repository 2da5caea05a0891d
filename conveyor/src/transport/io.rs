//! Per-connection framed I/O shared by the client session and the server's
//! per-connection handler.
//!
//! `compio`'s reads and writes are completion-based: a future that owns the
//! kernel's destination buffer must run to completion, it cannot be dropped
//! mid-flight the way a poll-based read can. That rules out racing a bare
//! `stream.read(buf)` against channel arms in the same `select!` the way the
//! teacher's operators race `flume` receivers and timers against each other
//! (see `batcher.rs`) — a losing read would either leak the buffer or block
//! the task on cancellation. The teacher's own `SocketActor` (the
//! "split-pump" design in `monocoque-core/src/actor.rs`) sidesteps this by
//! never racing the two: it owns the stream exclusively in one task and
//! alternates a non-blocking write-queue drain with a single blocking read,
//! yielding briefly between iterations so queued writes aren't starved.
//!
//! This session driver keeps that shape but bounds the read with
//! `compio::time::timeout` (the pattern the teacher's `xpub.rs` uses for
//! exactly this reason) instead of blocking indefinitely, so the caller's
//! `select!` over channels/timers still gets a turn every `POLL_INTERVAL`
//! even when the peer is silent.

use bytes::Bytes;
use compio::buf::BufResult;
use compio::io::{AsyncReadExt, AsyncWriteExt};
use compio::net::TcpStream;
use compio::time::timeout;
use conveyor_core::poison::PoisonGuard;
use conveyor_wire::{Frame, FrameDecoder, FrameError};
use std::io;
use std::time::Duration;
use tracing::warn;

/// How long a single read attempt blocks before giving the caller's
/// `select!` loop another turn.
pub(super) const POLL_INTERVAL: Duration = Duration::from_millis(20);

const READ_CHUNK: usize = 64 * 1024;

/// Owns one end of a TCP connection and turns it into framed reads/writes.
pub(super) struct FramedIo {
    stream: TcpStream,
    decoder: FrameDecoder,
    write_poisoned: bool,
}

/// Outcome of one bounded read attempt.
pub(super) enum PollOutcome {
    /// No bytes arrived within `POLL_INTERVAL`; nothing to do this tick.
    TimedOut,
    /// The peer decoded frames (possibly more than one pushed in the same
    /// read) are ready for the caller to handle, in arrival order.
    Frames(Vec<Frame>),
}

impl FramedIo {
    pub(super) const fn new(stream: TcpStream) -> Self {
        Self { stream, decoder: FrameDecoder::new(), write_poisoned: false }
    }

    /// Attempt to read more bytes, bounded by [`POLL_INTERVAL`]. A clean EOF
    /// or socket error is a genuine session failure and is returned as
    /// `Err`; a malformed frame is reported through [`FrameError`].
    pub(super) async fn poll_frames(&mut self) -> io::Result<PollOutcome> {
        let buf = Vec::with_capacity(READ_CHUNK);
        let read = timeout(POLL_INTERVAL, self.stream.read(buf)).await;
        let BufResult(result, buf) = match read {
            Ok(buf_result) => buf_result,
            Err(_elapsed) => return Ok(PollOutcome::TimedOut),
        };
        let n = result?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed connection"));
        }
        self.decoder.push(Bytes::copy_from_slice(&buf[..n]));

        let mut frames = Vec::new();
        loop {
            match self.decoder.next_frame() {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => break,
                Err(err) => return Err(frame_error_to_io(err)),
            }
        }
        Ok(PollOutcome::Frames(frames))
    }

    /// Write one frame to the wire.
    ///
    /// The length prefix and the header-plus-payload are two separate
    /// writes; [`PoisonGuard`] tracks whether both completed so a write
    /// failure between them is logged as a desynced connection (the peer's
    /// decoder is now expecting a body that will never fully arrive) rather
    /// than an ordinary write error.
    pub(super) async fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        let mut encoded = frame.encode();
        let len_prefix = encoded.split_to(conveyor_wire::frame::LEN_PREFIX_SIZE);

        let guard = PoisonGuard::new(&mut self.write_poisoned);
        let BufResult(result, _) = self.stream.write_all(len_prefix.to_vec()).await;
        result?;
        let BufResult(result, _) = self.stream.write_all(encoded.to_vec()).await;
        result?;
        guard.disarm();
        Ok(())
    }
}

fn frame_error_to_io(err: FrameError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

/// Encode a sequential-buffer `(seq, payload)` pair as a DATA frame, casting
/// the buffer's `u64` sequence down to the wire's `u32` (the high-water mark
/// never approaches `u32::MAX`, so this never truncates in practice).
pub(super) fn data_frame(seq: u64, payload: Bytes) -> Frame {
    Frame::data(seq as u32, payload)
}
