//! Construction of started limiters from client configurations.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::debug;

use super::algorithm::Algorithm;
use super::client::ClientConfig;
use super::strategy::{FixedWindow, LeakyBucket, Limiter, SlidingWindow, TokenBucket};
use crate::error::{RatekeeperError, Result};

/// Builds and starts the limiter matching a [`ClientConfig`].
///
/// The factory owns a handle to the tokio runtime that drives maintenance
/// ticks and the set of algorithms it is allowed to construct. It is cheap to
/// clone and is passed explicitly to whoever registers clients.
#[derive(Debug, Clone)]
pub struct StrategyFactory {
    runtime: Handle,
    enabled: HashSet<Algorithm>,
}

impl StrategyFactory {
    /// Create a factory that can build every known algorithm.
    pub fn new(runtime: Handle) -> Self {
        Self::with_algorithms(runtime, Algorithm::ALL)
    }

    /// Create a factory bound to the runtime of the calling context.
    pub fn from_current_runtime() -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| RatekeeperError::Runtime(e.to_string()))?;
        Ok(Self::new(runtime))
    }

    /// Create a factory restricted to the given algorithms.
    pub fn with_algorithms(runtime: Handle, algorithms: impl IntoIterator<Item = Algorithm>) -> Self {
        Self {
            runtime,
            enabled: algorithms.into_iter().collect(),
        }
    }

    /// Whether this factory will construct `algorithm`.
    pub fn supports(&self, algorithm: Algorithm) -> bool {
        self.enabled.contains(&algorithm)
    }

    /// Construct and start the limiter described by `config`.
    ///
    /// Callers never receive an unstarted limiter.
    pub fn create(&self, config: &ClientConfig) -> Result<Arc<dyn Limiter>> {
        let algorithm = config.algorithm();
        if !self.supports(algorithm) {
            return Err(RatekeeperError::UnsupportedAlgorithm(algorithm.to_string()));
        }

        let limiter: Arc<dyn Limiter> = match algorithm {
            Algorithm::TokenBucket => Arc::new(TokenBucket::new(
                config.capacity(),
                config.rate(),
                self.runtime.clone(),
            )),
            Algorithm::LeakyBucket => Arc::new(LeakyBucket::new(
                config.capacity(),
                config.rate(),
                self.runtime.clone(),
            )),
            Algorithm::FixedWindow => Arc::new(FixedWindow::new(
                config.capacity(),
                config.window(),
                self.runtime.clone(),
            )),
            Algorithm::SlidingWindow => {
                Arc::new(SlidingWindow::new(config.capacity(), config.window()))
            }
        };

        limiter.start();

        debug!(
            client_id = %config.client_id(),
            algorithm = %algorithm,
            capacity = config.capacity(),
            "Created rate limiter"
        );

        Ok(limiter)
    }
}
