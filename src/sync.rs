//! One-shot settlement cells.
//!
//! A `Deferred` is written at most once and read from any thread; waiters
//! block on a condvar until the value lands. Poisoned locks are recovered
//! rather than propagated since the protected state is a plain value.

use std::sync::{Condvar, Mutex, PoisonError};

/// Write-once cell with blocking readers.
pub(crate) struct Deferred<T> {
    slot: Mutex<Option<T>>,
    cond: Condvar,
}

impl<T: Clone> Deferred<T> {
    pub fn new() -> Self {
        Deferred {
            slot: Mutex::new(None),
            cond: Condvar::new(),
        }
    }

    /// Settle the cell. The first value wins; later calls are no-ops.
    /// Returns whether this call settled it.
    pub fn resolve(&self, value: T) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        self.cond.notify_all();
        true
    }

    /// Non-blocking read of the settled value.
    pub fn peek(&self) -> Option<T> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Block until settled and return the value.
    pub fn wait(&self) -> T {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(value) = slot.as_ref() {
                return value.clone();
            }
            slot = self
                .cond
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl<T: Clone> Default for Deferred<T> {
    fn default() -> Self {
        Deferred::new()
    }
}
