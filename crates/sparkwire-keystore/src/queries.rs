//! Key store queries.

use sparkwire_core::db::unix_timestamp;

use super::db::{DatabaseError, KeyDatabase};
use super::models::{DeviceKeyRow, ServerKeyRow};

impl KeyDatabase {
    // =========================================================================
    // Device key queries
    // =========================================================================

    /// Register or replace the public key for a device.
    ///
    /// Last writer wins: an existing row has its key and `updated_at` replaced.
    pub async fn upsert_device_key(
        &self,
        device_id: &str,
        public_key_pem: &str,
    ) -> Result<(), DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            "INSERT INTO device_keys (device_id, public_key_pem, updated_at) \
             VALUES (?, ?, ?) \
             ON CONFLICT(device_id) DO UPDATE SET public_key_pem = ?, updated_at = ?",
        )
        .bind(device_id)
        .bind(public_key_pem)
        .bind(now)
        .bind(public_key_pem)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Get the current key row for a device, if any.
    pub async fn get_device_key(&self, device_id: &str) -> Result<Option<DeviceKeyRow>, DatabaseError> {
        let row = sqlx::query_as::<_, DeviceKeyRow>("SELECT * FROM device_keys WHERE device_id = ?")
            .bind(device_id)
            .fetch_optional(self.pool())
            .await?;

        Ok(row)
    }

    /// Number of registered devices.
    pub async fn count_device_keys(&self) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM device_keys")
            .fetch_one(self.pool())
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Server key queries
    // =========================================================================

    /// Get the stored server keypair, if one has been created.
    pub async fn get_server_keys(&self) -> Result<Option<ServerKeyRow>, DatabaseError> {
        let row = sqlx::query_as::<_, ServerKeyRow>(
            "SELECT private_key_pem, public_key_pem, created_at FROM server_keys WHERE id = 1",
        )
        .fetch_optional(self.pool())
        .await?;

        Ok(row)
    }

    /// Store the server keypair.
    ///
    /// Fails if a keypair already exists; the server identity is never
    /// overwritten.
    pub async fn insert_server_keys(
        &self,
        private_key_pem: &str,
        public_key_pem: &str,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO server_keys (id, private_key_pem, public_key_pem, created_at) \
             VALUES (1, ?, ?, ?)",
        )
        .bind(private_key_pem)
        .bind(public_key_pem)
        .bind(unix_timestamp())
        .execute(self.pool())
        .await?;

        Ok(())
    }
}
