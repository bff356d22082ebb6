//! # Ratline Protocol Library
//!
//! Protocol primitives shared by the Ratline server and its agents: static
//! identities, the Noise handshake and transport encryption, and the frame
//! codec that carries Noise messages over a byte stream.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Command lines / responses        │  UTF-8 text
//! ├─────────────────────────────────────────┤
//! │           Noise Encryption              │  ChaCha20-Poly1305
//! ├─────────────────────────────────────────┤
//! │              Framing                    │  "RL" magic, length prefix
//! ├─────────────────────────────────────────┤
//! │              TCP stream                 │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Raw file streams (a length prefix followed by file bytes) are exchanged
//! directly on the TCP stream, outside the layers above.
//!
//! ## Modules
//!
//! - [`crypto`]: X25519 static identities and fingerprints
//! - [`noise`]: Noise XX handshake and transport state
//! - [`framing`]: frame codec
//! - [`error`]: error types

pub mod crypto;
pub mod error;
pub mod framing;
pub mod noise;

pub use crypto::{Identity, KEY_LENGTH};
pub use error::{ProtocolError, Result};
pub use framing::{FRAME_HEADER_SIZE, FRAME_MAGIC, MAX_PAYLOAD_SIZE};
pub use noise::{Handshake, Transport, MAX_MESSAGE_SIZE, NOISE_PATTERN, TAG_LENGTH};
