//! Fixed-interval polling.

use super::{lock, CheckFn, Monitor};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Runs a check immediately on start and then every `interval`.
///
/// Must be started from within a tokio runtime.
pub struct PollMonitor {
    interval: Duration,
    check: CheckFn,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollMonitor {
    pub fn new<F>(interval: Duration, check: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            interval,
            check: Arc::new(check),
            task: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Shortest period a ticker runs at. Zero is raised to this.
pub(crate) const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Interval whose first tick is one period from now.
pub(crate) fn ticker(period: Duration) -> tokio::time::Interval {
    let period = period.max(MIN_PERIOD);
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

impl Monitor for PollMonitor {
    fn start(&self) {
        {
            let mut task = lock(&self.task);
            if task.as_ref().is_some_and(|t| !t.is_finished()) {
                return;
            }

            let check = Arc::clone(&self.check);
            let mut ticker = ticker(self.interval);
            *task = Some(tokio::spawn(async move {
                loop {
                    ticker.tick().await;
                    check();
                }
            }));
        }

        tracing::debug!(interval_ms = self.interval.as_millis(), "Poll monitor started");
        (self.check)();
    }

    fn stop(&self) {
        if let Some(task) = lock(&self.task).take() {
            task.abort();
            tracing::debug!("Poll monitor stopped");
        }
    }

    fn is_running(&self) -> bool {
        lock(&self.task).as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for PollMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
