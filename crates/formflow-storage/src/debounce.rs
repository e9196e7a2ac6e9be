//! A cancel-and-reschedule timer.
//!
//! Each call to [`Debouncer::schedule`] aborts the previously scheduled task
//! and spawns a new one that waits for the configured delay before running.
//! A burst of calls therefore runs the work exactly once, after the burst
//! has paused.

use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// A debounce timer bound to the ambient tokio runtime.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    /// Creates a debouncer with the given delay.
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Returns the configured delay.
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedules `work` to run after the delay, cancelling any earlier
    /// scheduled work.
    ///
    /// Returns `false` without running anything when no tokio runtime is
    /// available; callers then perform the work synchronously.
    pub fn schedule<F>(&mut self, work: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let Ok(handle) = Handle::try_current() else {
            return false;
        };
        let delay = self.delay;
        self.pending = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            work.await;
        }));
        true
    }

    /// Aborts the scheduled task, if any. Returns `true` if one was still
    /// waiting.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    /// Returns `true` while a scheduled task has not yet completed.
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}
