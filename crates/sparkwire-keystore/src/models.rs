//! Database models for the key store.

use serde::{Deserialize, Serialize};

/// Device key record from the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeviceKeyRow {
    pub device_id: String,
    pub public_key_pem: String,
    pub updated_at: i64,
}

/// Server keypair record. There is at most one.
#[derive(Clone, sqlx::FromRow)]
pub struct ServerKeyRow {
    pub private_key_pem: String,
    pub public_key_pem: String,
    pub created_at: i64,
}

impl std::fmt::Debug for ServerKeyRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerKeyRow")
            .field("private_key_pem", &"[REDACTED]")
            .field("public_key_pem", &self.public_key_pem)
            .field("created_at", &self.created_at)
            .finish()
    }
}
