//! Error types for the protocol crate.

use thiserror::Error;

/// Protocol error type covering handshake, transport and framing failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Noise handshake could not be built or driven forward.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// Attempted to use the transport before the handshake finished.
    #[error("handshake incomplete: transport is not established")]
    HandshakeIncomplete,

    /// Encryption operation failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption or authentication failed.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Frame payload exceeds the maximum allowed size.
    #[error("frame too large: {size} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge {
        /// Actual payload size.
        size: usize,
        /// Maximum allowed payload size.
        max: usize,
    },

    /// Frame header carries the wrong magic bytes.
    #[error("invalid frame magic: expected {expected:#06x}, got {got:#06x}")]
    InvalidFrameMagic {
        /// Expected magic value.
        expected: u16,
        /// Actual magic value received.
        got: u16,
    },

    /// Identity key material has the wrong shape.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

impl From<snow::Error> for ProtocolError {
    fn from(err: snow::Error) -> Self {
        match err {
            snow::Error::Decrypt => ProtocolError::Decryption("authentication failed".to_string()),
            snow::Error::Input => ProtocolError::Encryption("malformed message".to_string()),
            other => ProtocolError::HandshakeFailed(other.to_string()),
        }
    }
}
