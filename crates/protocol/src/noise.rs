//! Noise XX handshake and transport encryption.
//!
//! Both ends of a connection run the XX pattern: three handshake messages,
//! then an encrypted transport. The agent initiates; the server responds.
//! Re-keying a live connection is simply a fresh handshake on the raw
//! transport whose resulting [`Transport`] replaces the old one.
//!
//! ```text
//! -> e
//! <- e, ee, s, es
//! -> s, se
//! ```

use snow::{Builder, HandshakeState, TransportState};

use crate::crypto::Identity;
use crate::error::{ProtocolError, Result};

/// The Noise pattern in use: mutual authentication via static keys,
/// Curve25519 key exchange, ChaCha20-Poly1305 AEAD, BLAKE2s hashing.
pub const NOISE_PATTERN: &str = "Noise_XX_25519_ChaChaPoly_BLAKE2s";

/// Maximum size of any Noise message, per the Noise specification.
pub const MAX_MESSAGE_SIZE: usize = 65535;

/// Overhead the AEAD adds to each transport message (Poly1305 tag).
pub const TAG_LENGTH: usize = 16;

fn builder(identity: &Identity) -> Result<Builder<'_>> {
    let params = NOISE_PATTERN
        .parse()
        .map_err(|e| ProtocolError::HandshakeFailed(format!("invalid noise pattern: {e}")))?;
    Ok(Builder::new(params).local_private_key(identity.secret_bytes()))
}

/// One side of an in-progress handshake.
///
/// Drive it by alternating [`write_message`](Self::write_message) and
/// [`read_message`](Self::read_message) in pattern order, then call
/// [`into_transport`](Self::into_transport) once finished. Out-of-turn
/// calls surface as [`ProtocolError::HandshakeFailed`].
pub struct Handshake {
    state: HandshakeState,
    buffer: Vec<u8>,
}

impl Handshake {
    /// Starts the initiator (agent) side of a handshake.
    pub fn initiator(identity: &Identity) -> Result<Self> {
        let state = builder(identity)?
            .build_initiator()
            .map_err(|e| ProtocolError::HandshakeFailed(format!("failed to build initiator: {e}")))?;
        Ok(Self::new(state))
    }

    /// Starts the responder (server) side of a handshake.
    pub fn responder(identity: &Identity) -> Result<Self> {
        let state = builder(identity)?
            .build_responder()
            .map_err(|e| ProtocolError::HandshakeFailed(format!("failed to build responder: {e}")))?;
        Ok(Self::new(state))
    }

    fn new(state: HandshakeState) -> Self {
        Self {
            state,
            buffer: vec![0u8; MAX_MESSAGE_SIZE],
        }
    }

    /// Produces the next handshake message to send to the peer.
    pub fn write_message(&mut self) -> Result<Vec<u8>> {
        let len = self.state.write_message(&[], &mut self.buffer)?;
        Ok(self.buffer[..len].to_vec())
    }

    /// Consumes a handshake message received from the peer.
    pub fn read_message(&mut self, message: &[u8]) -> Result<()> {
        self.state.read_message(message, &mut self.buffer)?;
        Ok(())
    }

    /// Whether all handshake messages have been exchanged.
    pub fn is_finished(&self) -> bool {
        self.state.is_handshake_finished()
    }

    /// The peer's static public key, once the pattern has revealed it.
    pub fn remote_static(&self) -> Option<[u8; 32]> {
        let remote = self.state.get_remote_static()?;
        let mut key = [0u8; 32];
        key.copy_from_slice(remote);
        Some(key)
    }

    /// Finalizes the handshake into an encrypted transport.
    pub fn into_transport(self) -> Result<Transport> {
        if !self.is_finished() {
            return Err(ProtocolError::HandshakeIncomplete);
        }
        let state = self.state.into_transport_mode()?;
        Ok(Transport {
            state,
            buffer: vec![0u8; MAX_MESSAGE_SIZE],
        })
    }
}

impl std::fmt::Debug for Handshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handshake")
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Encrypted transport established by a completed [`Handshake`].
pub struct Transport {
    state: TransportState,
    buffer: Vec<u8>,
}

impl Transport {
    /// Encrypts a plaintext into a transport message including the
    /// authentication tag.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        if plaintext.len() > MAX_MESSAGE_SIZE - TAG_LENGTH {
            return Err(ProtocolError::Encryption(format!(
                "plaintext too large: {} bytes exceeds maximum of {} bytes",
                plaintext.len(),
                MAX_MESSAGE_SIZE - TAG_LENGTH
            )));
        }
        let len = self.state.write_message(plaintext, &mut self.buffer)?;
        Ok(self.buffer[..len].to_vec())
    }

    /// Decrypts and authenticates a transport message.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::Decryption(format!(
                "ciphertext too large: {} bytes exceeds maximum of {} bytes",
                ciphertext.len(),
                MAX_MESSAGE_SIZE
            )));
        }
        let len = self.state.read_message(ciphertext, &mut self.buffer)?;
        Ok(self.buffer[..len].to_vec())
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}
