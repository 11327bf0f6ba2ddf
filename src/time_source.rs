//! Time source abstraction for real and simulated clocks.
//!
//! Every component that reads the clock or sleeps does so through a
//! [`TimeSource`] carried by the application context. The real source blocks
//! on the cancel token so a cancellation aborts the wait immediately; the
//! simulated source fast-forwards through sleeps and records them, which lets
//! tests observe retry delays and scheduling deadlines without waiting.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

#[cfg(any(test, feature = "testing-support"))]
use std::sync::{Mutex, PoisonError};

use crate::core::cancel::CancelToken;

/// Trait for abstracting time operations.
pub trait TimeSource: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;

    /// Block until `deadline`. Returns `false` if the wait was aborted.
    fn sleep_until(&self, deadline: DateTime<Utc>, cancel: &CancelToken) -> bool;

    /// Block for `duration`. Returns `false` if the wait was aborted.
    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> bool {
        let delta = TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX);
        let deadline = self.now().checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.sleep_until(deadline, cancel)
    }

    /// Check if this is a simulated time source.
    fn is_simulated(&self) -> bool;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealTimeSource;

impl TimeSource for RealTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep_until(&self, deadline: DateTime<Utc>, cancel: &CancelToken) -> bool {
        // Re-check the clock after each wake; the condvar may return early
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            let remaining = match (deadline - Utc::now()).to_std() {
                Ok(remaining) if !remaining.is_zero() => remaining,
                _ => return true,
            };
            if cancel.wait_timeout(remaining) {
                return false;
            }
        }
    }

    fn is_simulated(&self) -> bool {
        false
    }
}

#[cfg(any(test, feature = "testing-support"))]
#[derive(Debug)]
struct SimulatedState {
    current: DateTime<Utc>,
    waits: Vec<TimeDelta>,
}

/// Fast-forward clock for tests and dry runs.
///
/// Sleeping jumps the clock to the deadline instantly. Once a sleep would
/// cross the optional end time the simulation is over and every further
/// sleep returns `false`, the same as a cancellation.
#[cfg(any(test, feature = "testing-support"))]
#[derive(Debug)]
pub struct SimulatedTimeSource {
    state: Mutex<SimulatedState>,
    end_time: Option<DateTime<Utc>>,
}

#[cfg(any(test, feature = "testing-support"))]
impl SimulatedTimeSource {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(SimulatedState {
                current: start_time,
                waits: Vec::new(),
            }),
            end_time: None,
        }
    }

    /// Stop the simulation once the clock would pass `end_time`.
    pub fn with_end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self
    }

    /// Every wait requested so far, in order.
    pub fn waits(&self) -> Vec<TimeDelta> {
        self.lock().waits.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimulatedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(any(test, feature = "testing-support"))]
impl TimeSource for SimulatedTimeSource {
    fn now(&self) -> DateTime<Utc> {
        self.lock().current
    }

    fn sleep_until(&self, deadline: DateTime<Utc>, cancel: &CancelToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        let mut state = self.lock();
        if self.end_time.is_some_and(|end| deadline > end) {
            return false;
        }
        let wait = deadline - state.current;
        state.waits.push(wait);
        if deadline > state.current {
            state.current = deadline;
        }
        drop(state);
        !cancel.is_cancelled()
    }

    fn is_simulated(&self) -> bool {
        true
    }
}
