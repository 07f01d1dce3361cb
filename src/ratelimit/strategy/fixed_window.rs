//! Fixed window counter limiter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::trace;

use super::Limiter;
use crate::ratelimit::algorithm::Algorithm;
use crate::ratelimit::ticker::Ticker;

/// Admits up to `capacity` requests per window.
///
/// Windows are aligned to [`Limiter::start`], not to request arrival, and the
/// counter is reset to zero every `window`. Rejected requests still increment
/// the counter, so it can exceed `capacity` within a window. Up to twice the
/// capacity may be admitted across a window boundary.
pub struct FixedWindow {
    count: Arc<AtomicU64>,
    capacity: u64,
    ticker: Ticker,
}

impl FixedWindow {
    /// Create a not yet started limiter with an empty window.
    pub fn new(capacity: u64, window: Duration, runtime: Handle) -> Self {
        Self {
            count: Arc::new(AtomicU64::new(0)),
            capacity,
            ticker: Ticker::new("fixed_window", window, runtime),
        }
    }

    /// Reset the window counter immediately.
    pub fn reset(&self) {
        self.count.store(0, Ordering::Release);
    }

    /// Requests seen in the current window, including rejected ones.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// The window length.
    pub fn window(&self) -> Duration {
        self.ticker.period()
    }
}

impl Limiter for FixedWindow {
    fn decide(&self) -> bool {
        let seen = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        seen <= self.capacity
    }

    fn start(&self) {
        let count = Arc::clone(&self.count);
        self.ticker.start(move || {
            let previous = count.swap(0, Ordering::AcqRel);
            trace!(previous, "Fixed window reset");
        });
    }

    fn stop(&self) {
        self.ticker.stop();
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::FixedWindow
    }

    fn remaining(&self) -> u64 {
        self.capacity.saturating_sub(self.count())
    }
}
