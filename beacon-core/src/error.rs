//! Error types for framing and the byte connection beneath it.

use std::sync::Arc;

/// Errors raised by the connection underneath a codec.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// IO error from the underlying connection
    #[error("io error: {0}")]
    Io(Arc<std::io::Error>),

    /// Peer closed the connection
    #[error("connection closed")]
    ConnectionClosed,
}

/// Codec errors for serialization and framing.
///
/// Every variant is fatal to the connection it was raised on.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CodecError {
    /// Frame size exceeds maximum allowed
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Actual frame size
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Invalid frame format
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Encoding a header or body failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Decoding a header or body failed
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// The connection failed while reading or writing
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            return Self::ConnectionClosed;
        }
        Self::Io(Arc::new(e))
    }
}

impl From<std::io::Error> for CodecError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(e.into())
    }
}

impl CodecError {
    /// Check if the peer hung up rather than sending bad data.
    #[must_use]
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Self::Transport(TransportError::ConnectionClosed))
    }
}
