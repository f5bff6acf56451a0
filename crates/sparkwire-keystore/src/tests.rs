//! Storage layer tests for the key store.

#![allow(clippy::unwrap_used)]

use std::path::PathBuf;

use sparkwire_core::config::StorageConfig;
use sparkwire_crypto::{DeviceKeyRecord, DeviceKeyStore, ServerKeyStore, StoreError};

use super::db::KeyDatabase;

async fn test_db() -> KeyDatabase {
    KeyDatabase::open_in_memory().await.unwrap()
}

// === Device key tests ===

#[tokio::test]
async fn upsert_and_get_device_key() {
    let db = test_db().await;
    db.upsert_device_key("dev-1", "pem-a").await.unwrap();

    let row = db.get_device_key("dev-1").await.unwrap().unwrap();
    assert_eq!(row.device_id, "dev-1");
    assert_eq!(row.public_key_pem, "pem-a");
    assert!(row.updated_at > 0);

    assert!(db.get_device_key("dev-2").await.unwrap().is_none());
}

#[tokio::test]
async fn upsert_replaces_existing_key() {
    let db = test_db().await;
    db.upsert_device_key("dev-1", "pem-a").await.unwrap();
    db.upsert_device_key("dev-1", "pem-b").await.unwrap();

    let row = db.get_device_key("dev-1").await.unwrap().unwrap();
    assert_eq!(row.public_key_pem, "pem-b");
    assert_eq!(db.count_device_keys().await.unwrap(), 1);
}

#[tokio::test]
async fn device_store_trait_maps_rows() {
    let db = test_db().await;
    db.update(DeviceKeyRecord {
        device_id: "dev-1".into(),
        public_key_pem: "pem".into(),
    })
    .await
    .unwrap();

    let record = db.get_by_id("dev-1").await.unwrap().unwrap();
    assert_eq!(record.public_key_pem, "pem");
    assert!(db.get_by_id("missing").await.unwrap().is_none());
}

// === Server key tests ===

#[tokio::test]
async fn server_keys_absent_until_created() {
    let db = test_db().await;
    assert!(db.get_private_key().await.unwrap().is_none());

    db.create_keys("private", "public").await.unwrap();
    assert_eq!(db.get_private_key().await.unwrap().as_deref(), Some("private"));

    let row = db.get_server_keys().await.unwrap().unwrap();
    assert_eq!(row.public_key_pem, "public");
}

#[tokio::test]
async fn server_keys_are_never_overwritten() {
    let db = test_db().await;
    db.create_keys("first", "first-pub").await.unwrap();

    let err = db.create_keys("second", "second-pub").await.unwrap_err();
    assert!(matches!(err, StoreError::Backend(_)));
    assert_eq!(db.get_private_key().await.unwrap().as_deref(), Some("first"));
}

#[tokio::test]
async fn empty_private_key_is_corrupt() {
    let db = test_db().await;
    db.insert_server_keys("  ", "public").await.unwrap();
    assert!(matches!(
        db.get_private_key().await,
        Err(StoreError::Corrupt(_))
    ));
}

#[tokio::test]
async fn server_row_debug_redacts_private_key() {
    let db = test_db().await;
    db.insert_server_keys("SECRET-MATERIAL", "public").await.unwrap();
    let row = db.get_server_keys().await.unwrap().unwrap();
    let debug = format!("{row:?}");
    assert!(!debug.contains("SECRET-MATERIAL"));
    assert!(debug.contains("[REDACTED]"));
}

// === Configuration ===

#[tokio::test]
async fn open_configured_uses_database_path() {
    let dir = tempfile::tempdir().unwrap();
    let path: PathBuf = dir.path().join("keys.db");
    let config = StorageConfig {
        database_path: Some(path.clone()),
    };

    let db = KeyDatabase::open_configured(&config).await.unwrap();
    db.upsert_device_key("dev-1", "pem").await.unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn open_configured_without_path_is_in_memory() {
    let db = KeyDatabase::open_configured(&StorageConfig::default())
        .await
        .unwrap();
    assert_eq!(db.count_device_keys().await.unwrap(), 0);
}

#[tokio::test]
async fn in_memory_keys_outlive_idle_periods() {
    let db = KeyDatabase::open_configured(&StorageConfig::default())
        .await
        .unwrap();
    db.create_keys("private", "public").await.unwrap();
    db.upsert_device_key("dev-1", "pem").await.unwrap();

    // The only connection is never reaped, so its database never resets.
    let options = db.pool().options();
    assert_eq!(options.get_min_connections(), 1);
    assert!(options.get_idle_timeout().is_none());
    assert!(options.get_max_lifetime().is_none());

    for _ in 0..3 {
        assert!(db.get_device_key("dev-1").await.unwrap().is_some());
        assert_eq!(db.get_private_key().await.unwrap().as_deref(), Some("private"));
    }
}
