//! Database connection and initialization.

use sparkwire_core::config::StorageConfig;
use tracing::warn;

pub use sparkwire_core::db::DatabaseError;

sparkwire_core::define_database!(KeyDatabase, "Key database migrations complete");

impl KeyDatabase {
    /// Open the database named by the storage configuration.
    ///
    /// Without a configured path the keys live in memory for the life of
    /// the process and are lost on exit, including the server identity.
    pub async fn open_configured(config: &StorageConfig) -> Result<Self, DatabaseError> {
        match &config.database_path {
            Some(path) => Self::open(path).await,
            None => {
                warn!("No database_path configured, keys are held in memory and will not survive a restart");
                Self::open_in_memory().await
            }
        }
    }
}
