//! Start/stop-able observers of timer ticks or host-page mutations.
//!
//! Every monitor owns at most one underlying timer task or observer.
//! `start` is a no-op while running and `stop` is safe when stopped.
//! Callback panics are not caught: the immediate check on `start` panics
//! into the caller, and a panic on a tick ends that timer task.

pub mod adaptive;
pub mod mutation;
pub mod poll;

pub use adaptive::{AdaptiveConfig, AdaptivePollMonitor, PollRate};
pub use mutation::MutationMonitor;
pub use poll::PollMonitor;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Callback run on every poll.
pub type CheckFn = Arc<dyn Fn() + Send + Sync>;

/// Common monitor lifecycle.
pub trait Monitor: Send + Sync {
    /// Begins observation. Does nothing if already running.
    fn start(&self);

    /// Tears down observation. Does nothing if not running.
    fn stop(&self);

    fn is_running(&self) -> bool;
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
