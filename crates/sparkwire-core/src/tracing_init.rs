//! Shared tracing/logging initialization.
//!
//! Any binary embedding the Sparkwire crypto core uses the same pattern
//! for setting up `tracing_subscriber` with an env-filter and optional
//! JSON output.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Initialise the global tracing subscriber.
///
/// * `default_filter` -- default `RUST_LOG` value when the env-var is not set
///   (e.g. `"sparkwire_crypto=info"`).
/// * `log_json` -- when `true`, emit structured JSON log lines instead of the
///   human-readable format.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(default_filter: &str, log_json: bool) -> bool {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
    );
    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .is_ok()
    }
}

/// Initialise tracing from the `logging` section of the resolved config.
pub fn init_from_config(logging: &LoggingConfig) -> bool {
    let filter = format!(
        "sparkwire_core={level},sparkwire_crypto={level},sparkwire_keystore={level}",
        level = logging.log_level
    );
    init_tracing(&filter, logging.log_json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_reports_already_installed() {
        let logging = LoggingConfig::default();
        let _first = init_from_config(&logging);
        assert!(!init_tracing("sparkwire_core=debug", false));
    }
}
