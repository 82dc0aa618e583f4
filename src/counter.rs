//! HandleCounter: the mutex-guarded monotonic source of handles.
//!
//! The guard returned by [`HandleCounter::lock`] is the table's single
//! serialization point: inserts keep it across "peek, store, commit" and
//! `clear` keeps it for its whole sweep.

use crate::error::InsertError;
use crate::handle::Handle;
use parking_lot::{Mutex, MutexGuard};

#[derive(Debug)]
pub(crate) struct HandleCounter<K> {
    last: Mutex<K>,
}

impl<K: Handle> HandleCounter<K> {
    pub(crate) fn new() -> Self {
        Self {
            last: Mutex::new(K::ZERO),
        }
    }

    /// Take exclusive access to the counter.
    pub(crate) fn lock(&self) -> Issuer<'_, K> {
        Issuer {
            last: self.last.lock(),
        }
    }

    pub(crate) fn last_issued(&self) -> K {
        *self.last.lock()
    }
}

/// Exclusive access to the counter; releases it on drop.
pub(crate) struct Issuer<'a, K> {
    last: MutexGuard<'a, K>,
}

impl<'a, K: Handle> Issuer<'a, K> {
    /// The handle the next `commit` will record, without advancing.
    pub(crate) fn peek_next(&self) -> Result<K, InsertError> {
        self.last.checked_next().ok_or(InsertError::Exhausted)
    }

    /// Record `next` as issued. `next` must come from `peek_next` on this
    /// same guard.
    pub(crate) fn commit(&mut self, next: K) {
        debug_assert!(next > *self.last, "counter must only move forward");
        *self.last = next;
    }

    /// Advance the counter and return the new handle. On overflow the
    /// counter is left untouched.
    #[cfg(test)]
    pub(crate) fn issue(&mut self) -> Result<K, InsertError> {
        let next = self.peek_next()?;
        self.commit(next);
        Ok(next)
    }

    pub(crate) fn last(&self) -> K {
        *self.last
    }
}
