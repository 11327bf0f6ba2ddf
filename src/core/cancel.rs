//! Cooperative cancellation shared between the supervisor and its tasks.
//!
//! A [`CancelToken`] is a flag plus a condition variable: tasks poll it at
//! their loop tops and block on it while sleeping, so a cancellation requested
//! mid-sleep wakes the sleeper immediately. Tokens form a tree through
//! [`CancelToken::child`]; cancelling a parent cancels every descendant.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Inner {
    cancelled: Mutex<bool>,
    wakeup: Condvar,
    children: Mutex<Vec<CancelToken>>,
}

/// Clonable handle to a cancellation flag.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of this token and all of its children.
    pub fn cancel(&self) {
        {
            let mut cancelled = lock(&self.inner.cancelled);
            if *cancelled {
                return;
            }
            *cancelled = true;
        }
        self.inner.wakeup.notify_all();

        let children = std::mem::take(&mut *lock(&self.inner.children));
        for child in children {
            child.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *lock(&self.inner.cancelled)
    }

    /// Create a token that is cancelled together with this one.
    ///
    /// Cancelling the child leaves the parent untouched.
    pub fn child(&self) -> CancelToken {
        let child = CancelToken::new();
        let mut children = lock(&self.inner.children);
        if self.is_cancelled() {
            child.cancel();
        } else {
            children.retain(|c| !c.is_cancelled());
            children.push(child.clone());
        }
        child
    }

    /// Block for up to `timeout`. Returns `true` if cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut cancelled = lock(&self.inner.cancelled);

        while !*cancelled {
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                // Effectively forever
                None => Duration::from_secs(u32::MAX as u64),
            };
            if remaining.is_zero() {
                break;
            }
            cancelled = self
                .inner
                .wakeup
                .wait_timeout(cancelled, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }

        *cancelled
    }
}
