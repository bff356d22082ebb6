//! Length-prefixed framing for Noise messages.
//!
//! Every handshake message and every transport ciphertext travels in one
//! frame:
//!
//! - 2 bytes: magic `"RL"`
//! - 4 bytes: payload length (big-endian)
//! - N bytes: payload
//!
//! The codec is sans-IO: callers read the fixed-size header, ask
//! [`decode_header`] for the payload length, then read exactly that many
//! bytes. Raw file streams bypass framing entirely.

use crate::error::{ProtocolError, Result};
use crate::noise::MAX_MESSAGE_SIZE;

/// Magic bytes opening every frame.
pub const FRAME_MAGIC: [u8; 2] = *b"RL";

/// Frame header size: 2 (magic) + 4 (length).
pub const FRAME_HEADER_SIZE: usize = 6;

/// Maximum payload a frame may carry, matching the Noise message limit.
pub const MAX_PAYLOAD_SIZE: usize = MAX_MESSAGE_SIZE;

/// Encodes a payload into a complete frame.
pub fn encode(payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&FRAME_MAGIC);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Validates a frame header and returns the payload length to read next.
pub fn decode_header(header: &[u8; FRAME_HEADER_SIZE]) -> Result<usize> {
    if header[..2] != FRAME_MAGIC {
        return Err(ProtocolError::InvalidFrameMagic {
            expected: u16::from_be_bytes(FRAME_MAGIC),
            got: u16::from_be_bytes([header[0], header[1]]),
        });
    }

    let len = u32::from_be_bytes([header[2], header[3], header[4], header[5]]) as usize;
    if len > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            max: MAX_PAYLOAD_SIZE,
        });
    }

    Ok(len)
}
