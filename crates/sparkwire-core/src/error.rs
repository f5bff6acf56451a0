//! Error types for `Sparkwire` core library.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using `Sparkwire` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// A cipher or hash name outside the supported set.
    #[error("Unknown {kind}: {name}")]
    UnknownAlgorithm { kind: &'static str, name: String },

    /// A setting that parsed but is out of range or unusable.
    #[error("Invalid {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to read config file {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
