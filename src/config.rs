//! Configuration management for Ratekeeper.

use serde::{Deserialize, Serialize};

use crate::error::{RatekeeperError, Result};
use crate::ratelimit::{Algorithm, ClientConfig, ClientSpec};

/// Prefix for environment variable overrides, e.g. `RATEKEEPER__LOGGING__LEVEL`.
const ENV_PREFIX: &str = "RATEKEEPER";
const ENV_SEPARATOR: &str = "__";

/// Main configuration for Ratekeeper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatekeeperConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Limiter construction settings
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Clients registered at startup
    #[serde(default)]
    pub clients: Vec<ClientSpec>,

    /// Demonstration driver settings
    #[serde(default)]
    pub demo: DemoConfig,
}

/// Log output format.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level filter, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Limiter construction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Algorithms the strategy factory may construct
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<Algorithm>,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            algorithms: default_algorithms(),
        }
    }
}

fn default_algorithms() -> Vec<Algorithm> {
    Algorithm::ALL.to_vec()
}

/// Demonstration driver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Number of concurrent workers issuing requests
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Requests issued per client
    #[serde(default = "default_rounds")]
    pub rounds: usize,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            rounds: default_rounds(),
        }
    }
}

fn default_workers() -> usize {
    20
}

fn default_rounds() -> usize {
    50
}

impl RatekeeperConfig {
    /// Load configuration from a file, layered with environment overrides.
    ///
    /// The format is inferred from the file extension (YAML, TOML or JSON).
    pub fn from_file(path: &str) -> Result<Self> {
        ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| RatekeeperError::Config(e.to_string()))
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| RatekeeperError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// The four sample clients used when no configuration file is given.
    pub fn with_demo_clients() -> Self {
        let client = |id: &str, algorithm: Algorithm, capacity, refill_rate, window_secs| ClientSpec {
            client_id: id.to_string(),
            algorithm: algorithm.to_string(),
            capacity,
            refill_rate,
            window_secs,
        };

        Self {
            clients: vec![
                client("clientA", Algorithm::TokenBucket, 5, 2, 60),
                client("clientB", Algorithm::LeakyBucket, 10, 5, 60),
                client("clientC", Algorithm::FixedWindow, 100, 1, 60),
                client("clientD", Algorithm::SlidingWindow, 50, 1, 60),
            ],
            ..Self::default()
        }
    }

    /// Validate every declared client into a [`ClientConfig`].
    pub fn client_configs(&self) -> Result<Vec<ClientConfig>> {
        self.clients.iter().map(ClientConfig::try_from).collect()
    }
}
