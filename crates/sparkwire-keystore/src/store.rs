//! `sparkwire-crypto` key store traits backed by [`KeyDatabase`].

use async_trait::async_trait;
use sparkwire_crypto::{DeviceKeyRecord, DeviceKeyStore, ServerKeyStore, StoreError};
use tracing::debug;

use super::db::{DatabaseError, KeyDatabase};

fn backend(e: DatabaseError) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl DeviceKeyStore for KeyDatabase {
    async fn get_by_id(&self, device_id: &str) -> Result<Option<DeviceKeyRecord>, StoreError> {
        let row = self.get_device_key(device_id).await.map_err(backend)?;
        Ok(row.map(|r| DeviceKeyRecord {
            device_id: r.device_id,
            public_key_pem: r.public_key_pem,
        }))
    }

    async fn update(&self, record: DeviceKeyRecord) -> Result<(), StoreError> {
        self.upsert_device_key(&record.device_id, &record.public_key_pem)
            .await
            .map_err(backend)?;
        debug!(device_id = %record.device_id, "Device key row written");
        Ok(())
    }
}

#[async_trait]
impl ServerKeyStore for KeyDatabase {
    async fn get_private_key(&self) -> Result<Option<String>, StoreError> {
        let row = self.get_server_keys().await.map_err(backend)?;
        match row {
            Some(r) if r.private_key_pem.trim().is_empty() => {
                Err(StoreError::Corrupt("server private key is empty".into()))
            }
            Some(r) => Ok(Some(r.private_key_pem)),
            None => Ok(None),
        }
    }

    async fn create_keys(
        &self,
        private_key_pem: &str,
        public_key_pem: &str,
    ) -> Result<(), StoreError> {
        self.insert_server_keys(private_key_pem, public_key_pem)
            .await
            .map_err(backend)
    }
}
