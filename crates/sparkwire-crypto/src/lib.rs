//! `Sparkwire` Device-Cloud Crypto Core
//!
//! Provides the key handling and symmetric transforms used by the
//! device-cloud handshake and the encrypted message channel that follows it.
//!
//! ## Crypto primitives
//!
//! - **Server identity**: long-lived RSA keypair, PKCS#1 v1.5 encryption and signing
//! - **Device keys**: RSA public keys (SPKI PEM) keyed by device ID
//! - **Session**: 40-byte random session key → AES-128-CBC, IV chained from the
//!   last ciphertext block of the previous message
//! - **Integrity**: HMAC (SHA-1 by default) keyed with the full session key

pub mod error;
pub mod integrity;
pub mod keys;
pub mod manager;
pub mod session;
pub mod store;

pub use error::CryptoError;
pub use keys::{PublicKeyHandle, ServerKeyPair, SessionKey, fingerprint_of};
pub use manager::CryptoManager;
pub use session::{Direction, IV_LEN, KEY_LEN, MIN_SESSION_KEY_LEN, SessionCipher};
pub use store::{DeviceKeyRecord, DeviceKeyStore, MemoryKeyStore, ServerKeyStore, StoreError};
