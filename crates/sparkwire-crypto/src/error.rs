//! Crypto error types.

use crate::session::Direction;
use crate::store::StoreError;

/// Errors from cryptographic and key-store operations.
///
/// Every variant is recoverable: a failure aborts the handshake step that
/// triggered it and nothing else.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("Malformed public key: {0}")]
    MalformedKey(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("{direction} transform failed: {reason}")]
    TransformFailed { direction: Direction, reason: String },

    #[error("Key store error: {0}")]
    RepositoryError(#[from] StoreError),

    #[error("Secure randomness unavailable: {0}")]
    RandomnessUnavailable(String),
}
