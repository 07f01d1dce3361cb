//! Tracing subscriber setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{RatekeeperError, Result};

/// Build the level filter. `RUST_LOG` takes precedence over the configured level.
pub fn env_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| RatekeeperError::Config(format!("Invalid log level '{}': {}", level, e))),
    }
}

/// Install the global tracing subscriber.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(&config.level)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_thread_ids(true))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_thread_ids(true))
            .try_init(),
    };

    result.map_err(|e| RatekeeperError::Config(format!("Failed to install logger: {}", e)))
}
