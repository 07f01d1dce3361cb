//! Token bucket limiter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::trace;

use super::{Limiter, BUCKET_TICK};
use crate::ratelimit::algorithm::Algorithm;
use crate::ratelimit::ticker::Ticker;

/// Token state shared between deciders and the refill task.
struct Tokens {
    available: AtomicU64,
    capacity: u64,
    refill_rate: u64,
}

impl Tokens {
    fn try_take(&self) -> bool {
        let mut current = self.available.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return false;
            }
            match self.available.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn refill(&self) {
        let capacity = self.capacity;
        let rate = self.refill_rate;
        let result = self
            .available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |tokens| {
                (tokens < capacity && rate > 0).then(|| tokens.saturating_add(rate).min(capacity))
            });
        if let Ok(previous) = result {
            trace!(previous, capacity, "Token bucket refilled");
        }
    }
}

/// Admits bursts up to `capacity`, refilling `refill_rate` tokens every second.
///
/// The bucket starts full. Each admission consumes one token; each tick adds
/// `refill_rate` tokens without exceeding capacity.
pub struct TokenBucket {
    tokens: Arc<Tokens>,
    ticker: Ticker,
}

impl TokenBucket {
    /// Create a full, not yet started bucket.
    pub fn new(capacity: u64, refill_rate: u64, runtime: Handle) -> Self {
        Self {
            tokens: Arc::new(Tokens {
                available: AtomicU64::new(capacity),
                capacity,
                refill_rate,
            }),
            ticker: Ticker::new("token_bucket", BUCKET_TICK, runtime),
        }
    }

    /// Apply one refill tick immediately.
    pub fn refill(&self) {
        self.tokens.refill();
    }

    /// Tokens currently in the bucket.
    pub fn available(&self) -> u64 {
        self.tokens.available.load(Ordering::Acquire)
    }
}

impl Limiter for TokenBucket {
    fn decide(&self) -> bool {
        self.tokens.try_take()
    }

    fn start(&self) {
        let tokens = Arc::clone(&self.tokens);
        self.ticker.start(move || tokens.refill());
    }

    fn stop(&self) {
        self.ticker.stop();
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::TokenBucket
    }

    fn remaining(&self) -> u64 {
        self.available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_admits_capacity_then_rejects() {
        let bucket = TokenBucket::new(5, 1, Handle::current());

        for _ in 0..5 {
            assert!(bucket.decide());
        }
        assert!(!bucket.decide());
        assert_eq!(bucket.available(), 0);
    }

    #[tokio::test]
    async fn test_manual_refill_is_bounded() {
        let bucket = TokenBucket::new(3, 2, Handle::current());

        bucket.refill();
        assert_eq!(bucket.available(), 3);

        assert!(bucket.decide());
        bucket.refill();
        assert_eq!(bucket.available(), 3);

        for _ in 0..3 {
            assert!(bucket.decide());
        }
        bucket.refill();
        assert_eq!(bucket.available(), 2);
    }

    #[tokio::test]
    async fn test_zero_rate_never_refills() {
        let bucket = TokenBucket::new(1, 0, Handle::current());
        assert!(bucket.decide());
        bucket.refill();
        assert!(!bucket.decide());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_restores_tokens() {
        let bucket = TokenBucket::new(5, 2, Handle::current());
        bucket.start();

        for _ in 0..5 {
            assert!(bucket.decide());
        }
        assert!(!bucket.decide());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(bucket.decide());
        assert!(bucket.decide());
        assert!(!bucket.decide());

        bucket.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_never_exceed_capacity() {
        let bucket = TokenBucket::new(4, 3, Handle::current());
        bucket.start();

        assert!(bucket.decide());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(bucket.available(), 4);

        bucket.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_bucket_stays_empty() {
        let bucket = TokenBucket::new(2, 1, Handle::current());
        bucket.start();
        assert!(bucket.decide());
        assert!(bucket.decide());

        bucket.stop();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!bucket.decide());
    }

    #[tokio::test]
    async fn test_concurrent_decisions_admit_exactly_capacity() {
        const CAPACITY: u64 = 20;
        let bucket = TokenBucket::new(CAPACITY, 1, Handle::current());
        let admitted = AtomicU64::new(0);

        std::thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    for _ in 0..(CAPACITY * 100 / 16) {
                        if bucket.decide() {
                            admitted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::Relaxed), CAPACITY);
        assert_eq!(bucket.available(), 0);
    }

    /// Bursts of six requests once per tick, five times over.
    async fn admitted_under_load(capacity: u64, refill_rate: u64) -> usize {
        let bucket = TokenBucket::new(capacity, refill_rate, Handle::current());
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
        assert!(admitted_under_load(2, 1).await <= admitted_under_load(5, 3).await);
    }
}
