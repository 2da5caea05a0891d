//! A sans-IO frame decoder: feed it bytes as they arrive from the socket,
//! pull out whole frames as they become available.
//!
//! Structurally grounded on the teacher's `ZmtpDecoder` (two-phase
//! reassembly: a fast path when a whole frame is already buffered, a slow
//! path that stages a partial length or body across reads), adapted from
//! ZMTP's variable short/long header to this wire format's fixed `u32`
//! length prefix. Since this protocol has no handshake phase, there is no
//! `ZmtpSession`-style greeting/active state machine here — `FrameDecoder`
//! is the entire sans-IO layer.

use crate::frame::{Frame, FrameError, HEADER_SIZE, LEN_PREFIX_SIZE};
use bytes::Bytes;
use conveyor_core::buffer::SegmentedBuffer;

/// Default ceiling on a single frame's total body length (header + payload).
/// Guards against a corrupted or malicious length prefix causing unbounded
/// buffering, while staying comfortably above the largest single payload the
/// transport is required to carry (a 100 MiB payload is a 104_857_608-byte
/// body once the header is added).
pub const DEFAULT_MAX_FRAME_LEN: u32 = 128 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
enum Phase {
    /// Waiting for the 4-byte length prefix.
    Length,
    /// Waiting for `body_len` more bytes of frame body.
    Body { body_len: usize },
}

/// Reassembles a byte stream into [`Frame`]s.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: SegmentedBuffer,
    phase: Phase,
    max_frame_len: u32,
}

impl FrameDecoder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buf: SegmentedBuffer::new(),
            phase: Phase::Length,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    #[must_use]
    pub const fn with_max_frame_len(max_frame_len: u32) -> Self {
        Self {
            buf: SegmentedBuffer::new(),
            phase: Phase::Length,
            max_frame_len,
        }
    }

    /// Feed newly received bytes into the decoder.
    pub fn push(&mut self, bytes: Bytes) {
        self.buf.push(bytes);
    }

    /// Attempt to pull the next complete frame out of whatever has been
    /// pushed so far. Returns `Ok(None)` when more bytes are needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the length prefix declares a frame larger than
    /// `max_frame_len`, or if the body doesn't parse into a known command.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        loop {
            match self.phase {
                Phase::Length => {
                    if self.buf.len() < LEN_PREFIX_SIZE {
                        return Ok(None);
                    }
                    let mut len_bytes = [0u8; LEN_PREFIX_SIZE];
                    self.buf.copy_prefix(LEN_PREFIX_SIZE, &mut len_bytes);
                    self.buf.advance(LEN_PREFIX_SIZE);
                    let body_len = u32::from_le_bytes(len_bytes);
                    if body_len > self.max_frame_len {
                        return Err(FrameError::TooLarge(body_len, self.max_frame_len));
                    }
                    if (body_len as usize) < HEADER_SIZE {
                        return Err(FrameError::UnknownCommand(0));
                    }
                    self.phase = Phase::Body { body_len: body_len as usize };
                }
                Phase::Body { body_len } => {
                    if self.buf.len() < body_len {
                        return Ok(None);
                    }
                    let body = self
                        .buf
                        .take_bytes(body_len)
                        .expect("length already checked");
                    self.phase = Phase::Length;
                    return Frame::decode_body(body).map(Some);
                }
            }
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Command;

    #[test]
    fn test_whole_frame_in_one_push() {
        let mut decoder = FrameDecoder::new();
        let frame = Frame::data(1, Bytes::from_static(b"hello"));
        decoder.push(frame.encode().freeze());

        let decoded = decoder.next_frame().unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(decoder.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_frame_split_across_many_pushes() {
        let mut decoder = FrameDecoder::new();
        let frame = Frame::data(9, Bytes::from_static(b"abcdefghij"));
        let encoded = frame.encode().freeze();

        for byte in encoded {
            decoder.push(Bytes::from(vec![byte]));
            // Should not produce a frame until the very last byte arrives.
        }
        let decoded = decoder.next_frame().unwrap().unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut decoder = FrameDecoder::new();
        let f1 = Frame::ack(1);
        let f2 = Frame::ack(2);
        let mut combined = f1.encode();
        combined.extend_from_slice(&f2.encode());
        decoder.push(combined.freeze());

        let d1 = decoder.next_frame().unwrap().unwrap();
        let d2 = decoder.next_frame().unwrap().unwrap();
        assert_eq!(d1.command, Command::Ack);
        assert_eq!(d1.sequence, 1);
        assert_eq!(d2.sequence, 2);
        assert!(decoder.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut decoder = FrameDecoder::with_max_frame_len(16);
        let frame = Frame::data(1, Bytes::from_static(b"this payload is too long"));
        decoder.push(frame.encode().freeze());
        assert!(decoder.next_frame().is_err());
    }

    #[test]
    fn test_default_max_frame_len_admits_a_hundred_mebibyte_payload() {
        let body_len = HEADER_SIZE + 100 * 1024 * 1024;
        assert!(body_len as u32 <= DEFAULT_MAX_FRAME_LEN);
    }
}
