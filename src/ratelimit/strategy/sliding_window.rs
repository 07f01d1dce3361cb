//! Sliding window log limiter.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::Limiter;
use crate::ratelimit::algorithm::Algorithm;

/// Admits at most `capacity` requests in any rolling `window`.
///
/// Keeps one timestamp per admitted request. Timestamps older than
/// `now - window` are evicted from the front on every decision, and the
/// capacity check and append happen under the same lock. No background task.
pub struct SlidingWindow {
    capacity: u64,
    window: Duration,
    log: Mutex<VecDeque<Instant>>,
}

impl SlidingWindow {
    /// Create a limiter with an empty log.
    pub fn new(capacity: u64, window: Duration) -> Self {
        Self {
            capacity,
            window,
            log: Mutex::new(VecDeque::new()),
        }
    }

    /// The rolling window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Timestamps currently held, including any not yet evicted.
    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    /// Whether the log holds no timestamps.
    pub fn is_empty(&self) -> bool {
        self.log.lock().is_empty()
    }
}

impl Limiter for SlidingWindow {
    fn decide(&self) -> bool {
        let mut log = self.log.lock();
        // Sampled under the lock so the log stays in non-decreasing order.
        let now = Instant::now();

        if let Some(window_start) = now.checked_sub(self.window) {
            while log.front().is_some_and(|&ts| ts < window_start) {
                log.pop_front();
            }
        }

        if (log.len() as u64) < self.capacity {
            log.push_back(now);
            true
        } else {
            false
        }
    }

    fn start(&self) {}

    fn stop(&self) {}

    fn algorithm(&self) -> Algorithm {
        Algorithm::SlidingWindow
    }

    fn remaining(&self) -> u64 {
        let log = self.log.lock();
        let live = match Instant::now().checked_sub(self.window) {
            Some(window_start) => log.iter().filter(|&&ts| ts >= window_start).count(),
            None => log.len(),
        };
        self.capacity.saturating_sub(live as u64)
    }
}
