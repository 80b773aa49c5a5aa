//! Scheduled task — one cancellable handle for every timer and background job.
//!
//! Dropping a [`ScheduledTask`] cancels it, so a component replacing its
//! timer never leaves an orphan behind.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Handle to a spawned job.
#[derive(Debug, Default)]
pub struct ScheduledTask {
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// A handle with nothing scheduled.
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }

    /// Run `job` in the background.
    pub fn spawn<F>(job: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: Some(tokio::spawn(job)),
        }
    }

    /// Run `job` once `delay` has elapsed.
    pub fn after<F>(delay: Duration, job: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self::spawn(async move {
            tokio::time::sleep(delay).await;
            job.await;
        })
    }

    /// Run `job` every `period`, first after one full period.
    ///
    /// A run that takes longer than the period delays the next one instead
    /// of bursting to catch up.
    pub fn every<F, Fut>(period: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                job().await;
            }
        })
    }

    /// Cancel the job. Cancelling twice, or cancelling an idle handle, is a no-op.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Whether a job is scheduled and has not finished yet.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
