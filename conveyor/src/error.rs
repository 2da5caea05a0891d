//! The facade crate's error type: a thin wrapper uniting
//! [`conveyor_core::error::CoreError`] with the wire codec's [`FrameError`]
//! (only reachable with the `transport` feature enabled) and raw I/O errors
//! surfaced directly by the transport's socket calls.

use conveyor_core::error::CoreError;
use thiserror::Error;

/// Top-level error type for the `conveyor` facade.
#[derive(Error, Debug)]
pub enum ConveyorError {
    /// An error from one of the core dataflow primitives (operators, buffers,
    /// channels).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A malformed wire frame.
    #[cfg(feature = "transport")]
    #[error(transparent)]
    Frame(#[from] conveyor_wire::FrameError),

    /// A raw I/O error not already wrapped by [`CoreError::Io`] (e.g. from a
    /// `TcpListener::bind` call before any operator exists to attribute it
    /// to).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for `conveyor` facade operations.
pub type Result<T> = std::result::Result<T, ConveyorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_converts() {
        let err: ConveyorError = CoreError::programming("boom").into();
        assert!(matches!(err, ConveyorError::Core(_)));
    }

    #[test]
    fn test_io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: ConveyorError = io_err.into();
        assert!(matches!(err, ConveyorError::Io(_)));
    }
}
