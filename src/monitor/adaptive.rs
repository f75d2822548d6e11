//! Activity-sensitive polling.
//!
//! Polls fast while the user is active and slows down after a period with
//! no input. Rate switches replace the interval timer.

use super::poll::ticker;
use super::{lock, CheckFn, Monitor};
use crate::dom::InputEvent;
use crate::timing::Throttle;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Current polling rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollRate {
    Fast,
    Slow,
}

/// Timing parameters for [`AdaptivePollMonitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptiveConfig {
    pub fast_interval: Duration,
    pub slow_interval: Duration,
    /// Input-free time after which the monitor demotes to `slow_interval`.
    pub idle_timeout: Duration,
    /// Input events closer together than this count once.
    pub activity_throttle: Duration,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            fast_interval: Duration::from_secs(2),
            slow_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(60),
            activity_throttle: Duration::from_secs(1),
        }
    }
}

impl From<&crate::config::Config> for AdaptiveConfig {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            fast_interval: config.poll_fast,
            slow_interval: config.poll_slow,
            idle_timeout: config.idle_timeout,
            activity_throttle: config.activity_throttle,
        }
    }
}

/// Poll monitor that tracks user input to pick its interval.
///
/// Input arrives on a broadcast channel (mouse move, key down, click); a
/// fresh subscription is taken on every start.
pub struct AdaptivePollMonitor {
    config: AdaptiveConfig,
    check: CheckFn,
    input: broadcast::Sender<InputEvent>,
    rate: Arc<Mutex<PollRate>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AdaptivePollMonitor {
    pub fn new<F>(config: AdaptiveConfig, input: broadcast::Sender<InputEvent>, check: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            config,
            check: Arc::new(check),
            input,
            rate: Arc::new(Mutex::new(PollRate::Fast)),
            task: Mutex::new(None),
        }
    }

    pub fn current_rate(&self) -> PollRate {
        *lock(&self.rate)
    }

    pub fn config(&self) -> AdaptiveConfig {
        self.config
    }
}

impl Monitor for AdaptivePollMonitor {
    fn start(&self) {
        {
            let mut task = lock(&self.task);
            if task.as_ref().is_some_and(|t| !t.is_finished()) {
                return;
            }

            *lock(&self.rate) = PollRate::Fast;
            let driver = Driver {
                config: self.config,
                check: Arc::clone(&self.check),
                input: self.input.subscribe(),
                rate: Arc::clone(&self.rate),
                ticker: ticker(self.config.fast_interval),
                throttle: Throttle::new(self.config.activity_throttle),
            };
            *task = Some(tokio::spawn(driver.run()));
        }

        tracing::debug!(
            fast_ms = self.config.fast_interval.as_millis(),
            slow_ms = self.config.slow_interval.as_millis(),
            "Adaptive poll monitor started"
        );
        (self.check)();
    }

    fn stop(&self) {
        if let Some(task) = lock(&self.task).take() {
            task.abort();
            tracing::debug!("Adaptive poll monitor stopped");
        }
    }

    fn is_running(&self) -> bool {
        lock(&self.task).as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for AdaptivePollMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Driver {
    config: AdaptiveConfig,
    check: CheckFn,
    input: broadcast::Receiver<InputEvent>,
    rate: Arc<Mutex<PollRate>>,
    ticker: tokio::time::Interval,
    throttle: Throttle,
}

impl Driver {
    fn switch(&mut self, rate: PollRate) {
        let period = match rate {
            PollRate::Fast => self.config.fast_interval,
            PollRate::Slow => self.config.slow_interval,
        };
        self.ticker = ticker(period);
        *lock(&self.rate) = rate;
        tracing::debug!(?rate, period_ms = period.as_millis(), "Poll rate changed");
    }

    async fn run(mut self) {
        let idle = tokio::time::sleep(self.config.idle_timeout);
        tokio::pin!(idle);
        let mut current = PollRate::Fast;
        let mut input_open = true;

        loop {
            tokio::select! {
                _ = self.ticker.tick() => (self.check)(),
                () = &mut idle, if current == PollRate::Fast => {
                    current = PollRate::Slow;
                    self.switch(current);
                }
                event = self.input.recv(), if input_open => match event {
                    Ok(_) | Err(RecvError::Lagged(_)) => {
                        if !self.throttle.try_acquire() {
                            continue;
                        }
                        idle.as_mut().reset(Instant::now() + self.config.idle_timeout);
                        if current == PollRate::Slow {
                            current = PollRate::Fast;
                            self.switch(current);
                        }
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!("Input channel closed; staying at current rate");
                        input_open = false;
                    }
                },
            }
        }
    }
}
