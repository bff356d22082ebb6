//! Static identity used as the local Noise key.
//!
//! An identity is an X25519 keypair. The server generates one on first run
//! and persists it; agents generate a throwaway identity per connection.

use sha2::{Digest, Sha256};
use snow::Builder;

use crate::error::{ProtocolError, Result};
use crate::noise::NOISE_PATTERN;

/// Length of an X25519 key in bytes.
pub const KEY_LENGTH: usize = 32;

/// Bytes of the public-key digest used for the fingerprint.
const FINGERPRINT_LENGTH: usize = 16;

/// An X25519 static keypair for the Noise handshake.
#[derive(Clone)]
pub struct Identity {
    secret: [u8; KEY_LENGTH],
    public: [u8; KEY_LENGTH],
}

impl Identity {
    /// Generates a fresh random identity.
    pub fn generate() -> Result<Self> {
        let params = NOISE_PATTERN
            .parse()
            .map_err(|e| ProtocolError::HandshakeFailed(format!("invalid noise pattern: {e}")))?;
        let keypair = Builder::new(params).generate_keypair()?;

        let mut secret = [0u8; KEY_LENGTH];
        let mut public = [0u8; KEY_LENGTH];
        secret.copy_from_slice(&keypair.private);
        public.copy_from_slice(&keypair.public);

        Ok(Self { secret, public })
    }

    /// Reconstructs an identity from bytes previously produced by
    /// [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 2 * KEY_LENGTH {
            return Err(ProtocolError::InvalidIdentity(format!(
                "expected {} bytes, got {}",
                2 * KEY_LENGTH,
                bytes.len()
            )));
        }

        let mut secret = [0u8; KEY_LENGTH];
        let mut public = [0u8; KEY_LENGTH];
        secret.copy_from_slice(&bytes[..KEY_LENGTH]);
        public.copy_from_slice(&bytes[KEY_LENGTH..]);

        Ok(Self { secret, public })
    }

    /// Serializes the keypair for storage. Contains the secret key; the
    /// output must be treated as confidential.
    pub fn to_bytes(&self) -> [u8; 2 * KEY_LENGTH] {
        let mut out = [0u8; 2 * KEY_LENGTH];
        out[..KEY_LENGTH].copy_from_slice(&self.secret);
        out[KEY_LENGTH..].copy_from_slice(&self.public);
        out
    }

    /// The secret key, fed to the Noise builder as the local static key.
    pub fn secret_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.secret
    }

    /// The public key.
    pub fn public_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.public
    }

    /// Human-readable fingerprint of the public key: the first 16 bytes of
    /// its SHA-256 digest, as colon-separated groups of four hex digits.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.public);
        digest[..FINGERPRINT_LENGTH]
            .chunks(2)
            .map(|pair| format!("{:02x}{:02x}", pair[0], pair[1]))
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}
