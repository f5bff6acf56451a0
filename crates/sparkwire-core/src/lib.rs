//! `Sparkwire` Core Library
//!
//! Shared functionality for `Sparkwire` components:
//! - Configuration resolution (cipher suite, HMAC algorithm, storage, logging)
//! - Tracing subscriber initialisation
//! - `SQLite` pool helpers for key persistence
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod tracing_init;

pub use config::{CipherSuite, Config, CryptoConfig, HmacAlgorithm};
pub use error::{Error, Result};
