//! Rate limiting algorithm selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RatekeeperError;

/// The algorithm a client's limiter runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Burst up to capacity, refilled on a fixed tick
    TokenBucket,
    /// Bounded queue drained on a fixed tick
    LeakyBucket,
    /// Counter reset at fixed intervals
    FixedWindow,
    /// Rolling log of admission timestamps
    SlidingWindow,
}

impl Algorithm {
    /// Every algorithm the crate knows how to build.
    pub const ALL: [Algorithm; 4] = [
        Algorithm::TokenBucket,
        Algorithm::LeakyBucket,
        Algorithm::FixedWindow,
        Algorithm::SlidingWindow,
    ];

    /// Canonical snake_case name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::TokenBucket => "token_bucket",
            Algorithm::LeakyBucket => "leaky_bucket",
            Algorithm::FixedWindow => "fixed_window",
            Algorithm::SlidingWindow => "sliding_window",
        }
    }

    /// Whether the refill/leak rate parameter affects this algorithm.
    pub fn uses_rate(&self) -> bool {
        matches!(self, Algorithm::TokenBucket | Algorithm::LeakyBucket)
    }

    /// Whether the window length parameter affects this algorithm.
    pub fn uses_window(&self) -> bool {
        matches!(self, Algorithm::FixedWindow | Algorithm::SlidingWindow)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = RatekeeperError;

    /// Accepts snake_case, kebab-case and CamelCase spellings, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "tokenbucket" => Ok(Algorithm::TokenBucket),
            "leakybucket" => Ok(Algorithm::LeakyBucket),
            "fixedwindow" => Ok(Algorithm::FixedWindow),
            "slidingwindow" => Ok(Algorithm::SlidingWindow),
            _ => Err(RatekeeperError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}
