//! Leaky bucket limiter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::trace;

use super::{Limiter, BUCKET_TICK};
use crate::ratelimit::algorithm::Algorithm;
use crate::ratelimit::ticker::Ticker;

struct Queue {
    occupied: AtomicU64,
    capacity: u64,
    leak_rate: u64,
}

impl Queue {
    fn try_enqueue(&self) -> bool {
        let mut current = self.occupied.load(Ordering::Acquire);
        loop {
            if current >= self.capacity {
                return false;
            }
            match self.occupied.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn leak(&self) {
        let rate = self.leak_rate;
        let result = self
            .occupied
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |occupied| {
                (occupied > 0 && rate > 0).then(|| occupied.saturating_sub(rate))
            });
        if let Ok(previous) = result {
            trace!(previous, "Leaky bucket drained");
        }
    }
}

/// Bounds in-flight work to `capacity`, draining `leak_rate` slots every second.
pub struct LeakyBucket {
    queue: Arc<Queue>,
    ticker: Ticker,
}

impl LeakyBucket {
    /// Create an empty, not yet started bucket.
    pub fn new(capacity: u64, leak_rate: u64, runtime: Handle) -> Self {
        Self {
            queue: Arc::new(Queue {
                occupied: AtomicU64::new(0),
                capacity,
                leak_rate,
            }),
            ticker: Ticker::new("leaky_bucket", BUCKET_TICK, runtime),
        }
    }

    /// Apply one leak tick immediately.
    pub fn leak(&self) {
        self.queue.leak();
    }

    /// Slots currently occupied.
    pub fn occupied(&self) -> u64 {
        self.queue.occupied.load(Ordering::Acquire)
    }
}

impl Limiter for LeakyBucket {
    fn decide(&self) -> bool {
        self.queue.try_enqueue()
    }

    fn start(&self) {
        let queue = Arc::clone(&self.queue);
        self.ticker.start(move || queue.leak());
    }

    fn stop(&self) {
        self.ticker.stop();
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::LeakyBucket
    }

    fn remaining(&self) -> u64 {
        self.queue.capacity.saturating_sub(self.occupied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fills_to_capacity() {
        let bucket = LeakyBucket::new(10, 5, Handle::current());

        for _ in 0..10 {
            assert!(bucket.decide());
        }
        assert!(!bucket.decide());
        assert_eq!(bucket.occupied(), 10);
        assert_eq!(bucket.remaining(), 0);
    }

    #[tokio::test]
    async fn test_leak_never_goes_negative() {
        let bucket = LeakyBucket::new(10, 5, Handle::current());

        bucket.leak();
        assert_eq!(bucket.occupied(), 0);

        for _ in 0..3 {
            bucket.decide();
        }
        bucket.leak();
        assert_eq!(bucket.occupied(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_drains_rate_slots() {
        let bucket = LeakyBucket::new(4, 1, Handle::current());
        bucket.start();

        for _ in 0..4 {
            assert!(bucket.decide());
        }
        assert!(!bucket.decide());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(bucket.occupied(), 3);
        assert!(bucket.decide());
        assert!(!bucket.decide());

        bucket.stop();
    }

    #[tokio::test]
    async fn test_concurrent_decisions_admit_exactly_capacity() {
        const CAPACITY: u64 = 25;
        let bucket = LeakyBucket::new(CAPACITY, 1, Handle::current());
        let admitted = AtomicU64::new(0);

        std::thread::scope(|s| {
            for _ in 0..10 {
                s.spawn(|| {
                    for _ in 0..(CAPACITY * 10) {
                        if bucket.decide() {
                            admitted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::Relaxed), CAPACITY);
        assert_eq!(bucket.occupied(), CAPACITY);
    }

    async fn admitted_under_load(capacity: u64, leak_rate: u64) -> usize {
        let bucket = LeakyBucket::new(capacity, leak_rate, Handle::current());
        bucket.start();

        let mut admitted = 0;
        for _ in 0..5 {
            admitted += (0..6).filter(|_| bucket.decide()).count();
            tokio::time::sleep(Duration::from_millis(1100)).await;
        }

        bucket.stop();
        admitted
    }

    #[tokio::test(start_paused = true)]
    async fn test_larger_limits_never_admit_less() {
        assert!(admitted_under_load(2, 0).await <= admitted_under_load(5, 1).await);
        assert!(admitted_under_load(2, 1).await <= admitted_under_load(5, 1).await);
        assert!(admitted_under_load(2, 1).await <= admitted_under_load(2, 3).await);
        assert!(admitted_under_load(3, 1).await <= admitted_under_load(6, 4).await);
    }
}
