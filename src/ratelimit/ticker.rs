//! Periodic maintenance task shared by the tick-driven limiters.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, trace};

/// Handle to the running maintenance task.
struct Running {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Runs a callback every `period` on a tokio runtime until stopped.
///
/// The first tick fires one full period after [`Ticker::start`], so a limiter
/// never receives maintenance at construction time. Stopping signals the task
/// and returns immediately; a tick already executing runs to completion.
pub struct Ticker {
    label: &'static str,
    period: Duration,
    runtime: Handle,
    running: Mutex<Option<Running>>,
}

impl Ticker {
    /// Create a stopped ticker.
    pub fn new(label: &'static str, period: Duration, runtime: Handle) -> Self {
        Self {
            label,
            period,
            runtime,
            running: Mutex::new(None),
        }
    }

    /// The interval between ticks.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Spawn the maintenance task. Calling `start` on a running ticker is a no-op.
    pub fn start<F>(&self, mut on_tick: F)
    where
        F: FnMut() + Send + 'static,
    {
        let mut running = self.running.lock();
        if running.is_some() {
            return;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let label = self.label;
        let period = self.period;
        // Anchored here, not at first poll, so scheduling delay cannot shift ticks.
        let first_tick = Instant::now() + period;

        let task = self.runtime.spawn(async move {
            let mut interval = interval_at(first_tick, period);
            loop {
                tokio::select! {
                    biased;
                    // Also fires when the sender is dropped.
                    _ = shutdown_rx.changed() => break,
                    _ = interval.tick() => {
                        trace!(limiter = label, "Maintenance tick");
                        on_tick();
                    }
                }
            }
            debug!(limiter = label, "Maintenance task exited");
        });

        debug!(limiter = label, period = ?period, "Maintenance task started");
        *running = Some(Running { shutdown, task });
    }

    /// Signal the maintenance task to stop scheduling further ticks.
    pub fn stop(&self) {
        if let Some(running) = self.running.lock().take() {
            // A send error means the task is already gone.
            let _ = running.shutdown.send(true);
            debug!(limiter = self.label, "Maintenance task stop requested");
        }
    }

    /// Whether a maintenance task has been started and not yet stopped.
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|r| !r.task.is_finished())
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_period() {
        let ticks = Arc::new(AtomicU64::new(0));
        let ticker = Ticker::new("test", Duration::from_secs(1), Handle::current());

        let counter = ticks.clone();
        ticker.start(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_anchored_to_start() {
        let ticks = Arc::new(AtomicU64::new(0));
        let ticker = Ticker::new("test", Duration::from_secs(1), Handle::current());

        let counter = ticks.clone();
        ticker.start(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // The clock moves before the maintenance task is first polled.
        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_ticks() {
        let ticks = Arc::new(AtomicU64::new(0));
        let ticker = Ticker::new("test", Duration::from_secs(1), Handle::current());

        let counter = ticks.clone();
        ticker.start(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(ticker.is_running());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        ticker.stop();
        assert!(!ticker.is_running());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let ticks = Arc::new(AtomicU64::new(0));
        let ticker = Ticker::new("test", Duration::from_secs(1), Handle::current());

        for _ in 0..3 {
            let counter = ticks.clone();
            ticker.start(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_task() {
        let ticks = Arc::new(AtomicU64::new(0));
        {
            let ticker = Ticker::new("test", Duration::from_secs(1), Handle::current());
            let counter = ticks.clone();
            ticker.start(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }
}
