//! The wire frame: a fixed `u32` length prefix, a `u32` command, a `u32`
//! sequence number, and an opaque payload.
//!
//! Grounded on the original transport's `common.go` (`sendMsg`/`parseMsg`/
//! `encodeInt`/`decodeInt`, all little-endian `u32`s) for wire semantics, and
//! on the teacher's `ZmtpFrame::encode` for the `BytesMut`-building idiom.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Size in bytes of the length prefix itself.
pub const LEN_PREFIX_SIZE: usize = 4;

/// Size in bytes of the fixed header that follows the length prefix:
/// command (`u32`) + sequence (`u32`).
pub const HEADER_SIZE: usize = 8;

/// Wire-level command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// A regular data payload.
    Data,
    /// Acknowledgement of everything up to and including the carried
    /// sequence number.
    Ack,
    /// Graceful connection teardown.
    Close,
}

impl Command {
    const DATA: u32 = 0;
    const ACK: u32 = 1;
    const CLOSE: u32 = 2;

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::Data => Self::DATA,
            Self::Ack => Self::ACK,
            Self::Close => Self::CLOSE,
        }
    }

    pub const fn from_u32(value: u32) -> Result<Self, FrameError> {
        match value {
            Self::DATA => Ok(Self::Data),
            Self::ACK => Ok(Self::Ack),
            Self::CLOSE => Ok(Self::Close),
            other => Err(FrameError::UnknownCommand(other)),
        }
    }
}

/// Errors produced while decoding a frame's fixed header.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("unknown wire command: {0}")]
    UnknownCommand(u32),

    #[error("frame length {0} exceeds the configured maximum {1}")]
    TooLarge(u32, u32),
}

/// A decoded wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub sequence: u32,
    pub payload: Bytes,
}

impl Frame {
    #[must_use]
    pub const fn new(command: Command, sequence: u32, payload: Bytes) -> Self {
        Self { command, sequence, payload }
    }

    #[must_use]
    pub fn data(sequence: u32, payload: Bytes) -> Self {
        Self::new(Command::Data, sequence, payload)
    }

    #[must_use]
    pub fn ack(sequence: u32) -> Self {
        Self::new(Command::Ack, sequence, Bytes::new())
    }

    #[must_use]
    pub fn close(sequence: u32) -> Self {
        Self::new(Command::Close, sequence, Bytes::new())
    }

    /// Encode the frame into its length-prefixed wire representation:
    /// `u32 length | u32 command | u32 sequence | payload`, where `length`
    /// covers everything after the length prefix itself.
    #[must_use]
    pub fn encode(&self) -> BytesMut {
        let body_len = HEADER_SIZE + self.payload.len();
        let mut out = BytesMut::with_capacity(LEN_PREFIX_SIZE + body_len);
        out.put_u32_le(body_len as u32);
        out.put_u32_le(self.command.as_u32());
        out.put_u32_le(self.sequence);
        out.extend_from_slice(&self.payload);
        out
    }

    /// Decode a frame body (everything after the length prefix has already
    /// been stripped by the caller — see [`crate::decoder::FrameDecoder`]).
    pub fn decode_body(mut body: Bytes) -> Result<Self, FrameError> {
        if body.len() < HEADER_SIZE {
            return Err(FrameError::UnknownCommand(0));
        }
        let command = Command::from_u32(body.get_u32_le())?;
        let sequence = body.get_u32_le();
        Ok(Self { command, sequence, payload: body })
    }
}
