//! Generic one-to-many notification primitive keyed by string identifiers.
//!
//! A waiter is a [`tokio::sync::oneshot`] channel: consumers register under
//! a key and suspend on the receiver; producers deliver payloads with
//! [`WaiterRegistry::notify_all`] (fan-out) or
//! [`WaiterRegistry::notify_first`] (FIFO hand-off to exactly one waiter).
//!
//! FIFO ordering across concurrent registrations is guaranteed by a
//! process-wide sequence number and per-key `VecDeque`s.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// A registered waiter: its registration sequence and delivery channel.
struct Waiter<T> {
    seq: u64,
    tx: oneshot::Sender<T>,
}

/// Registry of waiters keyed by string identifiers.
pub struct WaiterRegistry<T> {
    inner: Mutex<HashMap<String, VecDeque<Waiter<T>>>>,
    next_seq: AtomicU64,
}

impl<T> WaiterRegistry<T> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Register a waiter under `key`.
    ///
    /// Returns the receiver to suspend on plus a guard that idempotently
    /// removes the registration (no-op if the waiter already fired or was
    /// already removed). Dropping the guard also removes it.
    pub fn register(&self, key: &str) -> (oneshot::Receiver<T>, WaiterGuard<'_, T>) {
        let (tx, rx) = oneshot::channel();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        {
            let mut inner = self.inner.lock();
            inner
                .entry(key.to_owned())
                .or_default()
                .push_back(Waiter { seq, tx });
        }
        (
            rx,
            WaiterGuard {
                registry: self,
                key: key.to_owned(),
                seq,
            },
        )
    }

    /// Deliver `payload` to the oldest surviving waiter for `key`.
    ///
    /// Waiters whose receiver is already gone are discarded and the next one
    /// is tried. Returns `true` iff some waiter actually consumed the
    /// payload.
    pub fn notify_first(&self, key: &str, payload: T) -> bool {
        let mut inner = self.inner.lock();
        let Some(queue) = inner.get_mut(key) else {
            return false;
        };
        let mut payload = payload;
        while let Some(waiter) = queue.pop_front() {
            match waiter.tx.send(payload) {
                Ok(()) => {
                    if queue.is_empty() {
                        let _ = inner.remove(key);
                    }
                    return true;
                }
                // Receiver dropped (timed out / gave up) — try the next one.
                Err(returned) => payload = returned,
            }
        }
        let _ = inner.remove(key);
        false
    }

    /// Remove all waiters for `key` without delivering anything.
    ///
    /// Their receivers observe a closed channel.
    pub fn clear(&self, key: &str) {
        let _ = self.inner.lock().remove(key);
    }

    /// Number of waiters currently registered for `key`.
    #[must_use]
    pub fn len(&self, key: &str) -> usize {
        self.inner.lock().get(key).map_or(0, VecDeque::len)
    }

    /// Whether no waiter is registered for `key`.
    #[must_use]
    pub fn is_empty(&self, key: &str) -> bool {
        self.len(key) == 0
    }

    /// Remove a specific registration. No-op if it already fired or was
    /// already removed.
    fn remove(&self, key: &str, seq: u64) {
        let mut inner = self.inner.lock();
        if let Some(queue) = inner.get_mut(key) {
            queue.retain(|w| w.seq != seq);
            if queue.is_empty() {
                let _ = inner.remove(key);
            }
        }
    }
}

impl<T: Clone> WaiterRegistry<T> {
    /// Deliver `payload` to every waiter registered for `key` at call time.
    ///
    /// The waiter list is snapshotted (taken out of the registry) before
    /// delivery, so waiters registered during the fan-out are untouched.
    pub fn notify_all(&self, key: &str, payload: &T) {
        let snapshot = { self.inner.lock().remove(key) };
        if let Some(queue) = snapshot {
            for waiter in queue {
                let _ = waiter.tx.send(payload.clone());
            }
        }
    }
}

impl<T> Default for WaiterRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Removal handle returned by [`WaiterRegistry::register`].
pub struct WaiterGuard<'a, T> {
    registry: &'a WaiterRegistry<T>,
    key: String,
    seq: u64,
}

impl<T> WaiterGuard<'_, T> {
    /// Explicitly remove the registration (idempotent).
    pub fn release(self) {
        // Drop does the work.
    }
}

impl<T> Drop for WaiterGuard<'_, T> {
    fn drop(&mut self) {
        self.registry.remove(&self.key, self.seq);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
