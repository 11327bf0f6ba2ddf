//! Single-writer observable values.
//!
//! [`observable`] splits a value into a [`Publisher`] (the only writer, not
//! `Clone`) and any number of [`Subscriber`]s. Every write is a whole-value
//! replacement under a lock plus a version bump, so readers never see a torn
//! value. Change notifications are delivered over plain mpsc channels and only
//! when the value actually changed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use super::cancel::CancelToken;

struct Shared<T> {
    value: RwLock<T>,
    version: AtomicU64,
    // Keyed so a scoped waiter can remove its own entry
    listeners: Mutex<Vec<(u64, Sender<T>)>>,
    next_listener: AtomicU64,
}

impl<T> Shared<T> {
    fn listeners(&self) -> std::sync::MutexGuard<'_, Vec<(u64, Sender<T>)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add_listener(&self) -> (u64, Receiver<T>) {
        let (tx, rx) = channel();
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.listeners().push((id, tx));
        (id, rx)
    }
}

/// Subscription that unregisters itself when dropped.
struct ScopedListener<'a, T> {
    shared: &'a Shared<T>,
    id: u64,
    updates: Receiver<T>,
}

impl<T> Drop for ScopedListener<'_, T> {
    fn drop(&mut self) {
        let id = self.id;
        self.shared.listeners().retain(|(listener, _)| *listener != id);
    }
}

/// Sole writer of an observable value.
pub struct Publisher<T> {
    shared: Arc<Shared<T>>,
}

/// Reader handle of an observable value.
pub struct Subscriber<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("version", &self.shared.version.load(Ordering::SeqCst))
            .finish()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("version", &self.shared.version.load(Ordering::SeqCst))
            .finish()
    }
}

/// Create an observable value holding `initial`.
pub fn observable<T: Clone + PartialEq>(initial: T) -> (Publisher<T>, Subscriber<T>) {
    let shared = Arc::new(Shared {
        value: RwLock::new(initial),
        version: AtomicU64::new(0),
        listeners: Mutex::new(Vec::new()),
        next_listener: AtomicU64::new(0),
    });
    (
        Publisher {
            shared: Arc::clone(&shared),
        },
        Subscriber { shared },
    )
}

impl<T: Clone + PartialEq> Publisher<T> {
    /// Replace the value. Returns `true` if it changed.
    ///
    /// Subscribers are notified only on change; closed channels are pruned.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self
                .shared
                .value
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if *current == value {
                return false;
            }
            *current = value.clone();
            self.shared.version.fetch_add(1, Ordering::SeqCst);
        }

        self.shared
            .listeners()
            .retain(|(_, tx)| tx.send(value.clone()).is_ok());
        true
    }

    pub fn get(&self) -> T {
        read(&self.shared)
    }

    pub fn subscriber(&self) -> Subscriber<T> {
        Subscriber {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + PartialEq> Subscriber<T> {
    pub fn get(&self) -> T {
        read(&self.shared)
    }

    /// Number of changes published so far.
    pub fn version(&self) -> u64 {
        self.shared.version.load(Ordering::SeqCst)
    }

    /// Receive every future change of the value.
    pub fn subscribe(&self) -> Receiver<T> {
        self.shared.add_listener().1
    }

    /// Block until the value satisfies `predicate` or `cancel` fires.
    ///
    /// Returns `None` when cancelled. Leaves no listener behind.
    pub fn wait_until(&self, predicate: impl Fn(&T) -> bool, cancel: &CancelToken) -> Option<T> {
        let current = self.get();
        if predicate(&current) {
            return Some(current);
        }

        let (id, updates) = self.shared.add_listener();
        let listener = ScopedListener {
            shared: &self.shared,
            id,
            updates,
        };
        // A write may have landed between the read and the registration
        let current = self.get();
        if predicate(&current) {
            return Some(current);
        }

        loop {
            if cancel.is_cancelled() {
                return None;
            }
            // Short slices keep cancellation prompt without a second wakeup source
            match listener.updates.recv_timeout(Duration::from_millis(100)) {
                Ok(value) if predicate(&value) => return Some(value),
                Ok(_) | Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    // Publisher is gone; the value can no longer change
                    let value = self.get();
                    return predicate(&value).then_some(value);
                }
            }
        }
    }
}

fn read<T: Clone>(shared: &Shared<T>) -> T {
    shared
        .value
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_set_notifies_only_on_change() {
        let (publisher, subscriber) = observable(1);
        let updates = subscriber.subscribe();

        assert!(!publisher.set(1));
        assert!(publisher.set(2));
        assert!(!publisher.set(2));
        assert!(publisher.set(3));

        assert_eq!(updates.try_iter().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(subscriber.version(), 2);
        assert_eq!(subscriber.get(), 3);
    }

    #[test]
    fn test_dropped_receivers_are_pruned() {
        let (publisher, subscriber) = observable(0);
        drop(subscriber.subscribe());
        assert!(publisher.set(1));
        assert!(publisher.shared.listeners().is_empty());
    }

    #[test]
    fn test_wait_until_sees_later_value() {
        let (publisher, subscriber) = observable(0);
        let cancel = CancelToken::new();

        let waiter = {
            let cancel = cancel.clone();
            thread::spawn(move || subscriber.wait_until(|v| *v >= 5, &cancel))
        };

        for value in 1..=5 {
            publisher.set(value);
        }
        assert_eq!(waiter.join().unwrap(), Some(5));
    }

    #[test]
    fn test_wait_until_returns_none_when_cancelled() {
        let (_publisher, subscriber) = observable(0);
        let cancel = CancelToken::new();
        cancel.cancel();
        assert_eq!(subscriber.wait_until(|v| *v > 0, &cancel), None);
    }

    #[test]
    fn test_repeated_waits_leave_no_listeners() {
        let (publisher, subscriber) = observable(7);
        let cancel = CancelToken::new();

        for _ in 0..10_000 {
            assert_eq!(subscriber.wait_until(|v| *v == 7, &cancel), Some(7));
        }
        assert!(publisher.shared.listeners().is_empty());
    }

    #[test]
    fn test_woken_and_cancelled_waits_unregister() {
        let (publisher, subscriber) = observable(0);

        let waiter = {
            let subscriber = subscriber.clone();
            thread::spawn(move || subscriber.wait_until(|v| *v == 1, &CancelToken::new()))
        };
        while publisher.shared.listeners().is_empty() {
            thread::yield_now();
        }
        publisher.set(1);
        assert_eq!(waiter.join().unwrap(), Some(1));

        let cancel = CancelToken::new();
        let waiter = {
            let subscriber = subscriber.clone();
            let cancel = cancel.clone();
            thread::spawn(move || subscriber.wait_until(|v| *v == 2, &cancel))
        };
        while publisher.shared.listeners().is_empty() {
            thread::yield_now();
        }
        cancel.cancel();
        assert_eq!(waiter.join().unwrap(), None);

        assert!(publisher.shared.listeners().is_empty());
        // Explicit subscriptions are unaffected
        let _updates = subscriber.subscribe();
        assert_eq!(publisher.shared.listeners().len(), 1);
    }
}
