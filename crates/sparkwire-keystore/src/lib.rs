//! `SQLite` key storage for `Sparkwire`.
//!
//! Persists device public keys and the server RSA keypair, and implements
//! the `sparkwire-crypto` key store traits on top of them.

mod db;
mod models;
mod queries;
mod store;

#[cfg(test)]
mod tests;

pub use db::{DatabaseError, KeyDatabase};
pub use models::{DeviceKeyRow, ServerKeyRow};
