//! Per-client limiter configuration.
//!
//! A [`ClientConfig`] is immutable once built. Declarative configuration files
//! describe clients as [`ClientSpec`] values which are validated into a
//! `ClientConfig` before registration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::algorithm::Algorithm;
use crate::error::{RatekeeperError, Result};

/// Default refill (token bucket) or leak (leaky bucket) rate per second.
pub const DEFAULT_RATE: u64 = 1;
/// Default window length for the window-based algorithms.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Immutable rate limiting parameters for one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    client_id: String,
    algorithm: Algorithm,
    capacity: u64,
    rate: u64,
    window: Duration,
}

impl ClientConfig {
    /// Start building a configuration with the required fields.
    pub fn builder(
        client_id: impl Into<String>,
        algorithm: Algorithm,
        capacity: u64,
    ) -> ClientConfigBuilder {
        ClientConfigBuilder {
            client_id: client_id.into(),
            algorithm,
            capacity,
            rate: DEFAULT_RATE,
            window: DEFAULT_WINDOW,
        }
    }

    /// The unique client identifier.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The algorithm this client is limited by.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Maximum burst (buckets) or requests per window (windows).
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Tokens added (token bucket) or slots drained (leaky bucket) per tick.
    pub fn rate(&self) -> u64 {
        self.rate
    }

    /// Window length for fixed and sliding windows.
    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    client_id: String,
    algorithm: Algorithm,
    capacity: u64,
    rate: u64,
    window: Duration,
}

impl ClientConfigBuilder {
    /// Set the refill or leak rate (per second).
    pub fn refill_rate(mut self, rate: u64) -> Self {
        self.rate = rate;
        self
    }

    /// Set the window length.
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set the window length in whole seconds.
    pub fn window_secs(self, secs: u64) -> Self {
        self.window(Duration::from_secs(secs))
    }

    /// Validate and produce the configuration.
    pub fn build(self) -> Result<ClientConfig> {
        if self.client_id.trim().is_empty() {
            return Err(RatekeeperError::Config("client id must not be empty".to_string()));
        }
        if self.capacity == 0 {
            return Err(RatekeeperError::Config(format!(
                "client '{}': capacity must be positive",
                self.client_id
            )));
        }
        if self.window.is_zero() {
            return Err(RatekeeperError::Config(format!(
                "client '{}': window length must be positive",
                self.client_id
            )));
        }

        Ok(ClientConfig {
            client_id: self.client_id,
            algorithm: self.algorithm,
            capacity: self.capacity,
            rate: self.rate,
            window: self.window,
        })
    }
}

/// Declarative description of a client, as read from a configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSpec {
    /// The client identifier
    pub client_id: String,
    /// Algorithm name, e.g. `token_bucket`
    pub algorithm: String,
    /// Capacity (burst size or requests per window)
    pub capacity: u64,
    /// Refill or leak rate per second
    #[serde(default = "default_rate")]
    pub refill_rate: u64,
    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_rate() -> u64 {
    DEFAULT_RATE
}

fn default_window_secs() -> u64 {
    DEFAULT_WINDOW.as_secs()
}

impl TryFrom<&ClientSpec> for ClientConfig {
    type Error = RatekeeperError;

    fn try_from(spec: &ClientSpec) -> Result<Self> {
        let algorithm: Algorithm = spec.algorithm.parse()?;
        ClientConfig::builder(spec.client_id.clone(), algorithm, spec.capacity)
            .refill_rate(spec.refill_rate)
            .window_secs(spec.window_secs)
            .build()
    }
}
