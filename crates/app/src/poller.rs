//! Backoff poller — sequential interval runner with exponential backoff.
//!
//! Used for configuration polling once the live channel gave up, and for
//! pairing status polling. The delay arithmetic lives in [`Backoff`] and is
//! testable without timers.

use std::future::Future;
use std::time::Duration;

use signage_domain::error::{SignageError, ValidationError};

use crate::scheduled_task::ScheduledTask;

/// No firing is ever scheduled sooner than this.
pub const MIN_DELAY: Duration = Duration::from_millis(250);

/// Poller timing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollerConfig {
    /// Delay after a successful run.
    pub interval: Duration,
    /// Upper bound of the delay under repeated failure.
    pub max_interval: Duration,
    /// Growth factor applied on each failure.
    pub backoff_factor: f64,
    /// Random spread applied to each delay, as a fraction of it.
    pub jitter_ratio: f64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            max_interval: Duration::from_secs(300),
            backoff_factor: 2.0,
            jitter_ratio: 0.1,
        }
    }
}

impl PollerConfig {
    /// Check the timing invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::OutOfRange`] for a zero interval, a
    /// maximum below the interval, a factor below one or a jitter ratio
    /// outside `0..1`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval.is_zero() {
            return Err(ValidationError::OutOfRange {
                field: "interval",
                constraint: "greater than zero",
            });
        }
        if self.max_interval < self.interval {
            return Err(ValidationError::OutOfRange {
                field: "max_interval",
                constraint: "at least interval",
            });
        }
        if self.backoff_factor.is_nan() || self.backoff_factor < 1.0 {
            return Err(ValidationError::OutOfRange {
                field: "backoff_factor",
                constraint: "at least 1.0",
            });
        }
        if !(0.0..1.0).contains(&self.jitter_ratio) {
            return Err(ValidationError::OutOfRange {
                field: "jitter_ratio",
                constraint: "within 0.0..1.0",
            });
        }
        Ok(())
    }
}

/// Current delay of a poller.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: PollerConfig,
    current: Duration,
}

impl Backoff {
    #[must_use]
    pub fn new(config: PollerConfig) -> Self {
        Self {
            current: config.interval,
            config,
        }
    }

    /// Delay before the next run, without jitter.
    #[must_use]
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Back to the base interval.
    pub fn on_success(&mut self) {
        self.current = self.config.interval;
    }

    /// Grow the delay, capped at the maximum.
    pub fn on_failure(&mut self) {
        let grown = self.current.mul_f64(self.config.backoff_factor);
        self.current = grown.min(self.config.max_interval);
    }

    /// Apply jitter to the current delay. `spread` is in `-1.0..=1.0`.
    #[must_use]
    pub fn jittered(&self, spread: f64) -> Duration {
        let factor = 1.0 + self.config.jitter_ratio * spread.clamp(-1.0, 1.0);
        self.current.mul_f64(factor.max(0.0)).max(MIN_DELAY)
    }
}

/// A running poller. Dropping it stops it.
#[derive(Debug, Default)]
pub struct Poller {
    task: ScheduledTask,
}

impl Poller {
    /// Start polling: `job` runs immediately, then again after each
    /// completion once the current delay elapsed. Runs never overlap.
    pub fn start<F, Fut>(config: PollerConfig, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), SignageError>> + Send + 'static,
    {
        let task = ScheduledTask::spawn(async move {
            let mut backoff = Backoff::new(config);
            loop {
                match job().await {
                    Ok(()) => backoff.on_success(),
                    Err(err) => {
                        backoff.on_failure();
                        tracing::warn!(
                            error = %err,
                            retry_in = ?backoff.current(),
                            "poll failed"
                        );
                    }
                }
                let delay = backoff.jittered(rand::random::<f64>() * 2.0 - 1.0);
                tokio::time::sleep(delay).await;
            }
        });
        Self { task }
    }

    /// Stop polling. Idempotent.
    pub fn stop(&mut self) {
        self.task.cancel();
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> PollerConfig {
        PollerConfig {
            interval: Duration::from_secs(10),
            max_interval: Duration::from_secs(60),
            backoff_factor: 2.0,
            jitter_ratio: 0.2,
        }
    }

    #[test]
    fn should_grow_monotonically_and_cap_under_failure() {
        let mut backoff = Backoff::new(config());
        let mut previous = backoff.current();
        let mut seen = Vec::new();
        for _ in 0..8 {
            backoff.on_failure();
            assert!(backoff.current() >= previous);
            assert!(backoff.current() <= Duration::from_secs(60));
            previous = backoff.current();
            seen.push(previous.as_secs());
        }
        assert_eq!(seen, [20, 40, 60, 60, 60, 60, 60, 60]);
    }

    #[test]
    fn should_reset_to_interval_after_one_success() {
        let mut backoff = Backoff::new(config());
        backoff.on_failure();
        backoff.on_failure();
        backoff.on_success();
        assert_eq!(backoff.current(), Duration::from_secs(10));
    }

    #[test]
    fn should_apply_jitter_within_ratio() {
        let backoff = Backoff::new(config());
        assert_eq!(backoff.jittered(0.0), Duration::from_secs(10));
        assert_eq!(backoff.jittered(1.0), Duration::from_secs(12));
        assert_eq!(backoff.jittered(-1.0), Duration::from_secs(8));
        assert_eq!(backoff.jittered(5.0), Duration::from_secs(12));
    }

    #[test]
    fn should_floor_jittered_delay() {
        let backoff = Backoff::new(PollerConfig {
            interval: Duration::from_millis(100),
            max_interval: Duration::from_millis(100),
            backoff_factor: 1.0,
            jitter_ratio: 0.5,
        });
        assert_eq!(backoff.jittered(-1.0), MIN_DELAY);
    }

    #[test]
    fn should_reject_invalid_config() {
        let mut bad = config();
        bad.max_interval = Duration::from_secs(1);
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.backoff_factor = 0.5;
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.jitter_ratio = 1.5;
        assert!(bad.validate().is_err());

        assert!(config().validate().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn should_fire_immediately_then_after_interval() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let _poller = Poller::start(
            PollerConfig {
                jitter_ratio: 0.0,
                ..config()
            },
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
        );

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn should_back_off_after_failures() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let _poller = Poller::start(
            PollerConfig {
                jitter_ratio: 0.0,
                ..config()
            },
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(SignageError::MediaPlayback("offline".to_string()))
                }
            },
        );

        // runs at t=0, t=20, t=60
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_idempotently() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let mut poller = Poller::start(config(), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        tokio::time::sleep(Duration::from_millis(1)).await;
        poller.stop();
        poller.stop();
        assert!(!poller.is_running());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
