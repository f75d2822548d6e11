//! Debounce and throttle wrappers over callback invocation.
//!
//! Both use tokio's clock, so they follow a paused test clock. `Debouncer`
//! schedules its timer with `tokio::spawn` and must be called from within a
//! runtime.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

struct Pending<T> {
    value: Option<T>,
    task: Option<JoinHandle<()>>,
    generation: u64,
}

/// Trailing-edge debouncer: only the last value of a burst is delivered,
/// `delay` after the burst ends.
pub struct Debouncer<T: Send + 'static> {
    delay: Duration,
    callback: Callback<T>,
    pending: Arc<Mutex<Pending<T>>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new<F>(delay: Duration, callback: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self {
            delay,
            callback: Arc::new(callback),
            pending: Arc::new(Mutex::new(Pending {
                value: None,
                task: None,
                generation: 0,
            })),
        }
    }

    /// Records `value` and restarts the delay.
    pub fn call(&self, value: T) {
        let mut pending = lock(&self.pending);
        if let Some(task) = pending.task.take() {
            task.abort();
        }
        pending.value = Some(value);
        pending.generation = pending.generation.wrapping_add(1);

        let generation = pending.generation;
        let delay = self.delay;
        let shared = Arc::clone(&self.pending);
        let callback = Arc::clone(&self.callback);

        pending.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let value = {
                let mut pending = lock(&shared);
                if pending.generation != generation {
                    return;
                }
                pending.task = None;
                pending.value.take()
            };
            if let Some(value) = value {
                callback(value);
            }
        }));
    }

    /// Delivers the pending value now, if any.
    pub fn flush(&self) {
        let value = {
            let mut pending = lock(&self.pending);
            if let Some(task) = pending.task.take() {
                task.abort();
            }
            pending.generation = pending.generation.wrapping_add(1);
            pending.value.take()
        };
        if let Some(value) = value {
            (self.callback)(value);
        }
    }

    /// Drops the pending value without delivering it.
    pub fn cancel(&self) {
        let mut pending = lock(&self.pending);
        if let Some(task) = pending.task.take() {
            task.abort();
        }
        pending.generation = pending.generation.wrapping_add(1);
        pending.value = None;
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.pending).value.is_some()
    }
}

impl<T: Send + 'static> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.pending).task.take() {
            task.abort();
        }
    }
}

/// Leading-edge rate limiter.
#[derive(Debug)]
pub struct Throttle {
    limit: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            last: Mutex::new(None),
        }
    }

    /// Returns true if at least `limit` has passed since the last accepted call.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut last = lock(&self.last);
        match *last {
            Some(prev) if now.duration_since(prev) < self.limit => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    pub fn reset(&self) {
        *lock(&self.last) = None;
    }
}

/// Wraps `f` so it runs at most once per `limit`; extra calls are dropped.
pub fn throttle<T, F>(f: F, limit: Duration) -> impl Fn(T) + Send + Sync
where
    F: Fn(T) + Send + Sync,
{
    let gate = Throttle::new(limit);
    move |value| {
        if gate.try_acquire() {
            f(value);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
