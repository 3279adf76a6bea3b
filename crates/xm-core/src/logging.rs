//! Logging setup

use crate::config::DebugConfig;
use tracing_subscriber::EnvFilter;

/// Build the filter for the configured level; `RUST_LOG` takes precedence when set
pub fn env_filter(config: &DebugConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_directive()))
}

/// Install the global fmt subscriber.
///
/// Calling this more than once is harmless; later calls leave the first subscriber in place.
pub fn init(config: &DebugConfig) {
    let result = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .try_init();

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}
