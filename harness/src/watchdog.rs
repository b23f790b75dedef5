//! Run-wide abort flag and operation deadlines.

use std::fmt::Display;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{after, bounded, select, Receiver};
use parking_lot::Mutex;
use tracing::{error, warn};

/// Shared abort flag for one benchmark run.
///
/// Once [`abort`](Self::abort) has been called the run never resumes;
/// every later [`is_aborted`](Self::is_aborted) returns `true`.
#[derive(Debug, Default)]
pub struct Watchdog {
    aborted: Mutex<bool>,
}

/// Result of racing an operation against a deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Race<T> {
    /// The operation finished first.
    Completed(T),
    /// The deadline fired first. The operation keeps running on its helper
    /// thread and its result is dropped when it arrives.
    TimedOut,
    /// The helper thread died without reporting a result.
    Lost,
}

impl Watchdog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a one-shot timer that fires once `duration` has elapsed.
    pub fn timer(&self, duration: Duration) -> Receiver<Instant> {
        after(duration)
    }

    /// Marks the run as aborted and logs `reason`.
    ///
    /// Concurrent callers each log their own reason.
    pub fn abort(&self, reason: impl Display) {
        *self.aborted.lock() = true;
        warn!("{reason}");
    }

    /// Returns `true` once any task has aborted the run.
    pub fn is_aborted(&self) -> bool {
        *self.aborted.lock()
    }

    /// Runs `op` on a helper thread and waits for it or for `timeout`,
    /// whichever comes first.
    ///
    /// A timed-out operation is abandoned, not cancelled.
    pub fn race<T, F>(&self, timeout: Duration, op: F) -> Race<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = bounded(1);
        let spawned = thread::Builder::new()
            .name("kvbench-op".to_string())
            .spawn(move || {
                // The receiver is gone if we already timed out.
                let _ = tx.send(op());
            });
        if let Err(err) = spawned {
            error!(error = %err, "failed to spawn operation thread");
            return Race::Lost;
        }

        let timer = self.timer(timeout);
        select! {
            recv(rx) -> result => result.map_or(Race::Lost, Race::Completed),
            recv(timer) -> _ => Race::TimedOut,
        }
    }
}
