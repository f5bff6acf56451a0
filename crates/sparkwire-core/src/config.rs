//! Configuration resolution for Sparkwire.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/sparkwire/settings.json)
//! 3. Explicit config file
//! 4. Environment variables (highest priority)
//!
//! Algorithm identifiers are closed enums. An unknown cipher or hash name
//! is a configuration error rather than a silent fallback.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Complete Sparkwire configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub crypto: CryptoConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Block cipher configuration used by the per-session transforms.
///
/// Names are matched case-insensitively, in files and in the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum CipherSuite {
    /// AES-128 in CBC mode with PKCS#7 padding.
    #[default]
    #[serde(rename = "aes-128-cbc")]
    Aes128Cbc,
    /// AES-128 in CBC mode without padding; messages must be block aligned.
    #[serde(rename = "aes-128-cbc-nopad")]
    Aes128CbcNoPad,
}

impl CipherSuite {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aes128Cbc => "aes-128-cbc",
            Self::Aes128CbcNoPad => "aes-128-cbc-nopad",
        }
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CipherSuite {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "aes-128-cbc" => Ok(Self::Aes128Cbc),
            "aes-128-cbc-nopad" => Ok(Self::Aes128CbcNoPad),
            other => Err(Error::UnknownAlgorithm {
                kind: "cipher suite",
                name: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for CipherSuite {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Hash function backing integrity-tag HMACs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum HmacAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

impl HmacAlgorithm {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }

    /// Length in bytes of a tag produced with this algorithm.
    pub const fn tag_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }
}

impl fmt::Display for HmacAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HmacAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            other => Err(Error::UnknownAlgorithm {
                kind: "HMAC algorithm",
                name: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for HmacAlgorithm {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Cryptographic configuration, resolved once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    pub cipher: CipherSuite,
    pub hmac: HmacAlgorithm,
    /// Modulus size for a freshly generated server keypair.
    pub server_key_bits: usize,
    /// Length of generated session keys: 16 key + 16 IV + 8 reserved.
    pub session_key_len: usize,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            cipher: CipherSuite::default(),
            hmac: HmacAlgorithm::default(),
            server_key_bits: 1024,
            session_key_len: 40,
        }
    }
}

/// Key persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
    pub log_json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

/// A config file as written: every field optional, so a file only
/// overrides the settings it names.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigOverlay {
    crypto: CryptoOverlay,
    storage: StorageOverlay,
    logging: LoggingOverlay,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CryptoOverlay {
    cipher: Option<CipherSuite>,
    hmac: Option<HmacAlgorithm>,
    server_key_bits: Option<usize>,
    session_key_len: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StorageOverlay {
    database_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoggingOverlay {
    log_level: Option<String>,
    log_json: Option<bool>,
}

/// Load configuration with hierarchical resolution.
pub fn load_config(config_file: Option<&Path>) -> Result<Config> {
    let global = global_config_path().filter(|p| p.exists());
    resolve_config(global.as_deref(), config_file, |key| std::env::var(key).ok())
}

/// Layer defaults, the global file, the explicit file and `lookup` overrides.
fn resolve_config<F>(global: Option<&Path>, explicit: Option<&Path>, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = Config::default();

    if let Some(path) = global {
        merge_config(&mut config, load_config_file(path)?);
    }
    if let Some(path) = explicit {
        merge_config(&mut config, load_config_file(path)?);
    }

    apply_overrides(&mut config, lookup)?;
    validate(&config)?;

    Ok(config)
}

fn merge_config(base: &mut Config, overlay: ConfigOverlay) {
    let ConfigOverlay {
        crypto,
        storage,
        logging,
    } = overlay;

    if let Some(cipher) = crypto.cipher {
        base.crypto.cipher = cipher;
    }
    if let Some(hmac) = crypto.hmac {
        base.crypto.hmac = hmac;
    }
    if let Some(bits) = crypto.server_key_bits {
        base.crypto.server_key_bits = bits;
    }
    if let Some(len) = crypto.session_key_len {
        base.crypto.session_key_len = len;
    }

    if storage.database_path.is_some() {
        base.storage.database_path = storage.database_path;
    }

    if let Some(level) = logging.log_level {
        base.logging.log_level = level;
    }
    if let Some(json) = logging.log_json {
        base.logging.log_json = json;
    }
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".sparkwire").join("settings.json"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/sparkwire/settings.json"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("sparkwire").join("settings.json"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

fn load_config_file(path: &Path) -> Result<ConfigOverlay> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| Error::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Apply `SPARKWIRE_*` overrides using `lookup` to resolve variable names.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("SPARKWIRE_CIPHER") {
        config.crypto.cipher = val.parse()?;
    }
    if let Some(val) = lookup("SPARKWIRE_HMAC") {
        config.crypto.hmac = val.parse()?;
    }
    if let Some(val) = lookup("SPARKWIRE_SERVER_KEY_BITS") {
        config.crypto.server_key_bits = val
            .parse()
            .map_err(|e| Error::InvalidValue {
                key: "SPARKWIRE_SERVER_KEY_BITS".into(),
                reason: format!("{val:?}: {e}"),
            })?;
    }
    if let Some(val) = lookup("SPARKWIRE_LOG_LEVEL") {
        config.logging.log_level = val;
    }
    if let Some(val) = lookup("SPARKWIRE_DATABASE_PATH") {
        config.storage.database_path = Some(PathBuf::from(val));
    }
    Ok(())
}

fn validate(config: &Config) -> Result<()> {
    if config.crypto.session_key_len < 32 {
        return Err(Error::InvalidValue {
            key: "crypto.session_key_len".into(),
            reason: format!("must be at least 32, got {}", config.crypto.session_key_len),
        });
    }
    if config.crypto.server_key_bits < 512 {
        return Err(Error::InvalidValue {
            key: "crypto.server_key_bits".into(),
            reason: format!("must be at least 512, got {}", config.crypto.server_key_bits),
        });
    }
    Ok(())
}
