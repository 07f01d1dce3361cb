//! Error types for the Ratekeeper admission engine.

use thiserror::Error;

/// Main error type for Ratekeeper operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RatekeeperError {
    /// Admission was requested for a client id that is not registered
    #[error("Client not registered: {0}")]
    UnknownClient(String),

    /// The requested algorithm cannot be constructed by the factory
    #[error("Unsupported rate limiter algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// No timing facility is available to drive maintenance ticks
    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Result type alias for Ratekeeper operations.
pub type Result<T> = std::result::Result<T, RatekeeperError>;
