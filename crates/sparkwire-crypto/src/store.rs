//! Key persistence contracts.
//!
//! The crypto core does not own storage. It consumes a device key store
//! (device ID to public key PEM) and a server key store (the single server
//! keypair) through these traits. `MemoryKeyStore` implements both for
//! embedding and tests; `sparkwire-keystore` provides a `SQLite` backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

/// A stored device public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceKeyRecord {
    pub device_id: String,
    /// SPKI PEM public key.
    pub public_key_pem: String,
}

/// Errors reported by key store backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Key store backend error: {0}")]
    Backend(String),

    #[error("Corrupt key record: {0}")]
    Corrupt(String),
}

/// Device public key registry.
///
/// At most one key is current per device ID; `update` replaces it.
#[async_trait]
pub trait DeviceKeyStore: Send + Sync {
    async fn get_by_id(&self, device_id: &str) -> Result<Option<DeviceKeyRecord>, StoreError>;

    async fn update(&self, record: DeviceKeyRecord) -> Result<(), StoreError>;
}

/// Storage for the server's RSA identity.
#[async_trait]
pub trait ServerKeyStore: Send + Sync {
    /// The private key PEM, or `None` if no keypair has been created.
    async fn get_private_key(&self) -> Result<Option<String>, StoreError>;

    async fn create_keys(&self, private_key_pem: &str, public_key_pem: &str)
    -> Result<(), StoreError>;
}

/// In-process implementation of both key stores.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    devices: RwLock<HashMap<String, String>>,
    server: RwLock<Option<(String, String)>>,
    server_reads: AtomicUsize,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get_private_key` calls served so far.
    pub fn server_key_reads(&self) -> usize {
        self.server_reads.load(Ordering::Relaxed)
    }

    /// The stored server public key PEM, if any.
    pub async fn server_public_key(&self) -> Option<String> {
        self.server.read().await.as_ref().map(|(_, public)| public.clone())
    }

    pub async fn device_count(&self) -> usize {
        self.devices.read().await.len()
    }
}

#[async_trait]
impl DeviceKeyStore for MemoryKeyStore {
    async fn get_by_id(&self, device_id: &str) -> Result<Option<DeviceKeyRecord>, StoreError> {
        Ok(self
            .devices
            .read()
            .await
            .get(device_id)
            .map(|pem| DeviceKeyRecord {
                device_id: device_id.to_string(),
                public_key_pem: pem.clone(),
            }))
    }

    async fn update(&self, record: DeviceKeyRecord) -> Result<(), StoreError> {
        self.devices
            .write()
            .await
            .insert(record.device_id, record.public_key_pem);
        Ok(())
    }
}

#[async_trait]
impl ServerKeyStore for MemoryKeyStore {
    async fn get_private_key(&self) -> Result<Option<String>, StoreError> {
        self.server_reads.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .server
            .read()
            .await
            .as_ref()
            .map(|(private, _)| private.clone()))
    }

    async fn create_keys(
        &self,
        private_key_pem: &str,
        public_key_pem: &str,
    ) -> Result<(), StoreError> {
        *self.server.write().await = Some((private_key_pem.to_string(), public_key_pem.to_string()));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(id: &str, pem: &str) -> DeviceKeyRecord {
        DeviceKeyRecord {
            device_id: id.into(),
            public_key_pem: pem.into(),
        }
    }

    #[tokio::test]
    async fn unknown_device_is_absent() {
        let store = MemoryKeyStore::new();
        assert!(store.get_by_id("dev-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_replaces_previous_key() {
        let store = MemoryKeyStore::new();
        store.update(record("dev-1", "old")).await.unwrap();
        store.update(record("dev-1", "new")).await.unwrap();

        assert_eq!(store.get_by_id("dev-1").await.unwrap(), Some(record("dev-1", "new")));
        assert_eq!(store.device_count().await, 1);
    }

    #[tokio::test]
    async fn server_keys_roundtrip_and_count_reads() {
        let store = MemoryKeyStore::new();
        assert!(store.get_private_key().await.unwrap().is_none());

        store.create_keys("private", "public").await.unwrap();
        assert_eq!(store.get_private_key().await.unwrap().as_deref(), Some("private"));
        assert_eq!(store.server_public_key().await.as_deref(), Some("public"));
        assert_eq!(store.server_key_reads(), 2);
    }
}
