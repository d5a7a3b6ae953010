//! Error types for the WebSocket engine.
//!
//! Every layer (frame codec, HTTP handshake, connection, hub) reports failures
//! through the single [`Error`] enum so callers can match on one type.

use thiserror::Error;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Malformed frame header or protocol violation.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Reserved bits set without a negotiated extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Control frame fragmented (RFC violation).
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Declared frame payload exceeds the configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Declared payload size.
        size: u64,
        /// Maximum allowed size.
        max: usize,
    },

    /// Reassembled message exceeds the configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Too many fragments in a single message.
    #[error("Too many fragments: {count} (max: {max})")]
    TooManyFragments {
        /// Actual fragment count.
        count: usize,
        /// Maximum allowed fragments.
        max: usize,
    },

    /// Peer closed the stream in the middle of a frame.
    #[error("Stream truncated mid-frame")]
    TruncatedStream,

    /// Buffer does not yet hold a whole frame.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// Upgrade request or response was missing or invalid.
    #[error("Handshake rejected: {0}")]
    HandshakeRejected(String),

    /// HTTP head exceeded the handshake size limit.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Bytes read so far.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Handshake did not complete within the configured timeout.
    #[error("Handshake timed out")]
    HandshakeTimeout,

    /// Header value would break HTTP framing.
    #[error("Invalid header value for {header}: {reason}")]
    InvalidHeaderValue {
        /// Header name.
        header: String,
        /// What is wrong with the value.
        reason: String,
    },

    /// A `ws://` URI could not be parsed.
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// Transport failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// Send attempted on a connection that is not open.
    #[error("Connection is not open")]
    NotOpen,

    /// Peer closed the stream cleanly between frames.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::TruncatedStream,
            _ => Error::Io(err.to_string()),
        }
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::HandshakeTimeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::FrameTooLarge {
            size: 20_000_000,
            max: 15_728_640,
        };
        assert_eq!(
            err.to_string(),
            "Frame too large: 20000000 bytes (max: 15728640)"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let ws_err: Error = io_err.into();
        assert!(matches!(ws_err, Error::Io(_)));
    }

    #[test]
    fn test_unexpected_eof_is_truncation() {
        let io_err = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
        assert_eq!(Error::from(io_err), Error::TruncatedStream);
    }

    #[test]
    fn test_error_clone() {
        let err = Error::NotOpen;
        let cloned = err.clone();
        assert_eq!(err, cloned);
    }
}
