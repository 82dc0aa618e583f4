//! Debug-only reentrancy guard.
//!
//! Detects a thread calling back into a table while it is already inside
//! one of that table's operations, e.g. from a `for_each` visitor or an
//! `insert_with` closure. Those closures run under the counter mutex or a
//! shard lock, so nested entry would deadlock; in debug builds it panics
//! instead. In release builds this compiles to a zero-cost no-op.
//!
//! Tracking is per thread: other threads entering the same table in
//! parallel is the normal case and is never flagged.

use core::marker::PhantomData;

#[cfg(debug_assertions)]
use std::cell::RefCell;
#[cfg(debug_assertions)]
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(debug_assertions)]
static NEXT_OWNER_ID: AtomicU64 = AtomicU64::new(1);

#[cfg(debug_assertions)]
thread_local! {
    // Ids of the tracked structures this thread is currently inside.
    static ENTERED: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// Per-instance reentrancy tracker. Embed this in structs to guard public
/// entry-points with `let _g = self.reentrancy.enter();`.
#[derive(Debug)]
pub(crate) struct DebugReentrancy {
    #[cfg(debug_assertions)]
    id: u64,
}

impl DebugReentrancy {
    pub(crate) fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            id: NEXT_OWNER_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Enter a guarded section. In debug builds, panics if this thread is
    /// already inside a guarded section of the same instance.
    #[inline]
    pub(crate) fn enter(&self) -> ReentrancyGuard<'_> {
        #[cfg(debug_assertions)]
        {
            ENTERED.with(|entered| {
                let mut entered = entered.borrow_mut();
                assert!(
                    !entered.contains(&self.id),
                    "reentrancy detected: closure called back into the handle table it was passed to"
                );
                entered.push(self.id);
            });
            return ReentrancyGuard {
                owner: self,
                _not_send: PhantomData,
            };
        }

        #[cfg(not(debug_assertions))]
        {
            return ReentrancyGuard {
                _owner: PhantomData,
                _not_send: PhantomData,
            };
        }
    }
}

impl Default for DebugReentrancy {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by `DebugReentrancy::enter`. Must be dropped on the
/// thread that created it.
pub(crate) struct ReentrancyGuard<'a> {
    #[cfg(debug_assertions)]
    owner: &'a DebugReentrancy,
    #[cfg(not(debug_assertions))]
    _owner: PhantomData<&'a ()>,
    _not_send: PhantomData<*const ()>,
}

impl<'a> Drop for ReentrancyGuard<'a> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            let id = self.owner.id;
            // Ignore thread-local teardown; there is nothing left to track.
            let _ = ENTERED.try_with(|entered| {
                let mut entered = entered.borrow_mut();
                if let Some(pos) = entered.iter().rposition(|&e| e == id) {
                    entered.remove(pos);
                }
            });
        }
    }
}
