//! Central authority for asymmetric and session-key operations.
//!
//! `CryptoManager` is the only holder of the server private key. The key is
//! loaded behind a one-shot barrier: [`CryptoManager::ready`] loads it from
//! the server key store, or generates and persists a new one when the store
//! is empty. Concurrent callers share a single load. Until the barrier has
//! completed, synchronous operations that need the private key fail with
//! their typed error instead of touching a half-initialised key.

use std::sync::Arc;

use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign};
use sparkwire_core::CryptoConfig;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::CryptoError;
use crate::integrity;
use crate::keys::{PublicKeyHandle, ServerKeyPair, SessionKey};
use crate::session::SessionCipher;
use crate::store::{DeviceKeyRecord, DeviceKeyStore, ServerKeyStore};

pub struct CryptoManager {
    device_keys: Arc<dyn DeviceKeyStore>,
    server_keys: Arc<dyn ServerKeyStore>,
    server_key: OnceCell<ServerKeyPair>,
    config: CryptoConfig,
}

impl std::fmt::Debug for CryptoManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoManager")
            .field("ready", &self.is_ready())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CryptoManager {
    /// Create a manager without loading the server key yet.
    pub fn new(
        device_keys: Arc<dyn DeviceKeyStore>,
        server_keys: Arc<dyn ServerKeyStore>,
        config: CryptoConfig,
    ) -> Self {
        Self {
            device_keys,
            server_keys,
            server_key: OnceCell::new(),
            config,
        }
    }

    /// Create a manager and wait for the server key to be available.
    pub async fn initialize(
        device_keys: Arc<dyn DeviceKeyStore>,
        server_keys: Arc<dyn ServerKeyStore>,
        config: CryptoConfig,
    ) -> Result<Self, CryptoError> {
        let manager = Self::new(device_keys, server_keys, config);
        manager.ready().await?;
        Ok(manager)
    }

    /// Readiness barrier for the server keypair.
    ///
    /// Resolves once the key is loaded. A failed load is retried by the
    /// next caller.
    pub async fn ready(&self) -> Result<&ServerKeyPair, CryptoError> {
        self.server_key
            .get_or_try_init(|| self.load_server_key())
            .await
    }

    pub fn is_ready(&self) -> bool {
        self.server_key.initialized()
    }

    pub const fn config(&self) -> &CryptoConfig {
        &self.config
    }

    async fn load_server_key(&self) -> Result<ServerKeyPair, CryptoError> {
        match self.server_keys.get_private_key().await? {
            Some(pem) => {
                let keypair = ServerKeyPair::from_private_pem(&pem)?;
                info!(
                    fingerprint = %keypair.public_key().fingerprint(),
                    "Loaded server key"
                );
                Ok(keypair)
            }
            None => self.create_server_keys().await,
        }
    }

    async fn create_server_keys(&self) -> Result<ServerKeyPair, CryptoError> {
        let bits = self.config.server_key_bits;
        let keypair = tokio::task::spawn_blocking(move || ServerKeyPair::generate(bits))
            .await
            .map_err(|e| CryptoError::InvalidKeyMaterial(format!("key generation task: {e}")))??;

        let private_pem = keypair.private_key_pem()?;
        let public_pem = keypair.public_key_pem()?;
        self.server_keys
            .create_keys(&private_pem, &public_pem)
            .await?;

        info!(
            bits,
            fingerprint = %keypair.public_key().fingerprint(),
            "Generated and stored new server key"
        );
        Ok(keypair)
    }

    fn server_key(&self) -> Option<&ServerKeyPair> {
        self.server_key.get()
    }

    /// SPKI PEM of the server public key, for provisioning devices.
    pub fn server_public_key_pem(&self) -> Result<String, CryptoError> {
        self.server_key()
            .ok_or_else(|| CryptoError::InvalidKeyMaterial("server key not loaded".into()))?
            .public_key_pem()
    }

    /// Build the outbound-encrypt and inbound-decrypt transforms for a session.
    pub fn derive_session_transforms(
        &self,
        session_key: &[u8],
    ) -> Result<(SessionCipher, SessionCipher), CryptoError> {
        SessionCipher::pair_from_session_key(session_key, self.config.cipher)
    }

    /// HMAC over `ciphertext` keyed by the full session key.
    pub fn compute_integrity_tag(
        &self,
        ciphertext: &[u8],
        session_key: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        integrity::compute_tag(self.config.hmac, ciphertext, session_key)
    }

    pub fn verify_integrity_tag(&self, ciphertext: &[u8], session_key: &[u8], tag: &[u8]) -> bool {
        integrity::verify_tag(self.config.hmac, ciphertext, session_key, tag)
    }

    /// Store `public_key_pem` as the current key for `device_id`.
    ///
    /// The PEM is parsed before anything is persisted, so a malformed key
    /// never reaches the store.
    pub async fn register_device_public_key(
        &self,
        device_id: &str,
        public_key_pem: &str,
    ) -> Result<PublicKeyHandle, CryptoError> {
        let handle = PublicKeyHandle::from_pem(public_key_pem)?;
        self.device_keys
            .update(DeviceKeyRecord {
                device_id: device_id.to_string(),
                public_key_pem: public_key_pem.to_string(),
            })
            .await?;

        debug!(device_id, fingerprint = %handle.fingerprint(), "Registered device key");
        Ok(handle)
    }

    /// Fetch and parse the current key for `device_id`.
    pub async fn lookup_device_public_key(
        &self,
        device_id: &str,
    ) -> Result<Option<PublicKeyHandle>, CryptoError> {
        self.device_keys
            .get_by_id(device_id)
            .await?
            .map(|record| PublicKeyHandle::from_pem(&record.public_key_pem))
            .transpose()
    }

    /// True iff `pem` is byte-for-byte the canonical export of `handle`.
    #[allow(clippy::unused_self)]
    pub fn keys_equal(&self, handle: &PublicKeyHandle, pem: &str) -> bool {
        handle.matches_pem(pem)
    }

    /// RSA PKCS#1 v1.5 decryption with the server private key.
    pub fn decrypt_with_server_key(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let keypair = self
            .server_key()
            .ok_or_else(|| CryptoError::DecryptionFailed("server key not loaded".into()))?;
        keypair
            .rsa()
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
    }

    /// RSA PKCS#1 v1.5 encryption under an arbitrary public key.
    #[allow(clippy::unused_self)]
    pub fn encrypt_with_public_key(
        &self,
        public_key: &PublicKeyHandle,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        public_key
            .rsa()
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
    }

    /// PKCS#1 v1.5 private-key operation over a caller-supplied digest.
    ///
    /// The digest is padded as-is, without a `DigestInfo` prefix.
    pub fn sign_with_server_key(&self, digest: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let keypair = self
            .server_key()
            .ok_or_else(|| CryptoError::SigningFailed("server key not loaded".into()))?;
        keypair
            .rsa()
            .sign(Pkcs1v15Sign::new_unprefixed(), digest)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))
    }

    /// Check a signature produced by [`Self::sign_with_server_key`] or a
    /// device performing the same operation.
    #[allow(clippy::unused_self)]
    pub fn verify_signature(
        &self,
        public_key: &PublicKeyHandle,
        digest: &[u8],
        signature: &[u8],
    ) -> bool {
        public_key
            .rsa()
            .verify(Pkcs1v15Sign::new_unprefixed(), digest, signature)
            .is_ok()
    }

    /// `size` bytes from the OS CSPRNG, drawn off the async executor.
    pub async fn secure_random_bytes(&self, size: usize) -> Result<Vec<u8>, CryptoError> {
        tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; size];
            OsRng
                .try_fill_bytes(&mut buf)
                .map(|()| buf)
                .map_err(|e| CryptoError::RandomnessUnavailable(e.to_string()))
        })
        .await
        .map_err(|e| CryptoError::RandomnessUnavailable(e.to_string()))?
    }

    /// Fresh session key of the configured length.
    pub async fn create_session_key(&self) -> Result<SessionKey, CryptoError> {
        self.secure_random_bytes(self.config.session_key_len)
            .await
            .map(SessionKey::from_bytes)
    }

    /// Uniform value in `1..=65535`.
    pub fn random_u16_nonzero() -> u16 {
        OsRng.gen_range(1..=u16::MAX)
    }
}
