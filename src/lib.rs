//! Ratekeeper - per-client admission control
//!
//! This crate decides, at call time, whether to admit or reject requests from
//! registered clients. Each client is bound to its own limiter running one of
//! four algorithms: token bucket, leaky bucket, fixed window or sliding window.

pub mod config;
pub mod error;
pub mod logging;
pub mod ratelimit;

pub use error::{RatekeeperError, Result};
pub use ratelimit::{Algorithm, ClientConfig, ClientRegistry, StrategyFactory};
