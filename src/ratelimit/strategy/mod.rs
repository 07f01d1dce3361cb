//! Rate limiting strategies.
//!
//! Every algorithm implements [`Limiter`]. The bucket algorithms and the fixed
//! window own a [`Ticker`](super::ticker::Ticker) that performs their periodic
//! maintenance; the sliding window evicts lazily on each decision.
//!
//! If a maintenance task stops ticking, buckets stop refilling or draining and
//! fixed windows stop resetting. Every such failure leaves the limiter
//! stricter, never more permissive.

mod fixed_window;
mod leaky_bucket;
mod sliding_window;
mod token_bucket;

use std::time::Duration;

pub use fixed_window::FixedWindow;
pub use leaky_bucket::LeakyBucket;
pub use sliding_window::SlidingWindow;
pub use token_bucket::TokenBucket;

use super::algorithm::Algorithm;

/// Interval between refill/leak ticks for the bucket algorithms.
pub const BUCKET_TICK: Duration = Duration::from_secs(1);

/// The admission contract shared by all algorithms.
///
/// `decide` may be called concurrently from any number of threads. For a
/// single instance the outcome of concurrent calls is equivalent to some
/// serial order of those calls.
pub trait Limiter: Send + Sync {
    /// Evaluate one request. Returns `true` to admit, `false` to reject.
    fn decide(&self) -> bool;

    /// Begin periodic maintenance, if the algorithm needs any.
    fn start(&self);

    /// Halt periodic maintenance. The limiter is retired afterwards.
    fn stop(&self);

    /// Which algorithm this limiter runs.
    fn algorithm(&self) -> Algorithm;

    /// Approximate number of requests that would currently be admitted.
    fn remaining(&self) -> u64;
}
