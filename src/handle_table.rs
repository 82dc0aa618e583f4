//! HandleTable: counter-issued handles over a sharded concurrent map.

use crate::counter::HandleCounter;
use crate::error::InsertError;
use crate::handle::Handle;
use crate::reentrancy::DebugReentrancy;
use core::hash::BuildHasher;
use core::ops::ControlFlow;
use dashmap::DashMap;
use std::collections::hash_map::RandomState;

/// A concurrent table that stores values under handles it issues itself.
///
/// Every `insert` advances a private counter and stores the value under the
/// new counter value, so handles are unique for the lifetime of the table
/// and are never reused, even after `delete` or `clear`. All methods take
/// `&self`; share the table across threads with `Arc` or scoped threads.
///
/// Only `insert`, `insert_with` and `clear` serialize on the counter. Reads,
/// writes and deletes go straight to the map and contend only on its shard
/// locks.
///
/// Closures handed to `insert_with`, `get_with`, `update`, `for_each` and
/// `retain` run while a lock is held and must not call back into the same
/// table. Debug builds panic when they do.
pub struct HandleTable<K, V, S = RandomState> {
    counter: HandleCounter<K>,
    map: DashMap<K, V, S>,
    reentrancy: DebugReentrancy,
}

impl<K, V> HandleTable<K, V>
where
    K: Handle,
{
    /// Create an empty table with the default hasher.
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }

    /// Create an empty table with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, RandomState::new())
    }

    /// Create a table whose map is split into `shard_amount` shards.
    ///
    /// # Panics
    ///
    /// Panics if `shard_amount` is not a power of two greater than one.
    pub fn with_shard_amount(shard_amount: usize) -> Self {
        Self::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), shard_amount)
    }
}

impl<K, V> Default for HandleTable<K, V>
where
    K: Handle,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> HandleTable<K, V, S>
where
    K: Handle,
    S: BuildHasher + Clone,
{
    /// Create an empty table whose map hashes handles with `hasher`.
    pub fn with_hasher(hasher: S) -> Self {
        Self::from_map(DashMap::with_hasher(hasher))
    }

    /// Create an empty table with room for `capacity` entries, hashing with `hasher`.
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self::from_map(DashMap::with_capacity_and_hasher(capacity, hasher))
    }

    /// # Panics
    ///
    /// Panics if `shard_amount` is not a power of two greater than one.
    pub fn with_capacity_and_hasher_and_shard_amount(
        capacity: usize,
        hasher: S,
        shard_amount: usize,
    ) -> Self {
        Self::from_map(DashMap::with_capacity_and_hasher_and_shard_amount(
            capacity,
            hasher,
            shard_amount,
        ))
    }

    fn from_map(map: DashMap<K, V, S>) -> Self {
        Self {
            counter: HandleCounter::new(),
            map,
            reentrancy: DebugReentrancy::new(),
        }
    }

    /// Number of stored entries. Under concurrent mutation this is a
    /// momentary reading.
    pub fn len(&self) -> usize {
        let _g = self.reentrancy.enter();
        self.map.len()
    }

    /// Whether the table currently stores no entries.
    pub fn is_empty(&self) -> bool {
        let _g = self.reentrancy.enter();
        self.map.is_empty()
    }

    /// The most recent handle issued by `insert`, or `K::ZERO` if none has
    /// been issued yet. Handles written with `set` do not count.
    pub fn last_issued(&self) -> K {
        let _g = self.reentrancy.enter();
        self.counter.last_issued()
    }

    /// Store `value` under a freshly issued handle and return the handle.
    ///
    /// Fails with [`InsertError::Exhausted`] once the handle type has no
    /// values left; `value` is dropped in that case.
    pub fn insert(&self, value: V) -> Result<K, InsertError> {
        self.insert_with(move |_| value)
    }

    /// Like `insert`, but builds the value from its own handle. `make` runs
    /// exactly once per call unless the handle space is exhausted. If `make`
    /// panics, the handle it was shown is not consumed.
    pub fn insert_with<F>(&self, make: F) -> Result<K, InsertError>
    where
        F: FnOnce(K) -> V,
    {
        let (handle, displaced) = {
            let _g = self.reentrancy.enter();
            let mut issuer = self.counter.lock();
            let handle = match issuer.peek_next() {
                Ok(handle) => handle,
                Err(err) => {
                    tracing::debug!(last = ?issuer.last(), "handle space exhausted");
                    return Err(err);
                }
            };
            // Commit only once the value exists: a panicking `make` consumes
            // no handle.
            let value = make(handle);
            let displaced = self.map.insert(handle, value);
            issuer.commit(handle);
            (handle, displaced)
        };
        if displaced.is_some() {
            // `set` wrote this handle before the counter reached it.
            tracing::trace!(?handle, "insert replaced an out-of-band entry");
        }
        drop(displaced);
        Ok(handle)
    }

    /// A clone of the value stored under `handle`.
    pub fn get(&self, handle: K) -> Option<V>
    where
        V: Clone,
    {
        let _g = self.reentrancy.enter();
        self.map.get(&handle).map(|entry| entry.value().clone())
    }

    /// Run `f` against the value stored under `handle` without cloning it.
    /// The entry's shard is read-locked while `f` runs.
    pub fn get_with<R, F>(&self, handle: K, f: F) -> Option<R>
    where
        F: FnOnce(&V) -> R,
    {
        let _g = self.reentrancy.enter();
        self.map.get(&handle).map(|entry| f(entry.value()))
    }

    /// Whether a value is stored under `handle`.
    pub fn contains_key(&self, handle: K) -> bool {
        let _g = self.reentrancy.enter();
        self.map.contains_key(&handle)
    }

    /// Store `value` under `handle`, replacing and returning any previous
    /// value. No handle is issued: `handle` may be one returned by `insert`
    /// or any caller-chosen value. A caller-chosen handle above
    /// `last_issued()` will be overwritten when the counter reaches it.
    pub fn set(&self, handle: K, value: V) -> Option<V> {
        let _g = self.reentrancy.enter();
        self.map.insert(handle, value)
    }

    /// Mutate the value stored under `handle` in place. The entry's shard is
    /// write-locked while `f` runs.
    pub fn update<R, F>(&self, handle: K, f: F) -> Option<R>
    where
        F: FnOnce(&mut V) -> R,
    {
        let _g = self.reentrancy.enter();
        self.map
            .get_mut(&handle)
            .map(|mut entry| f(entry.value_mut()))
    }

    /// Remove and return the value stored under `handle`. Absent handles are
    /// a no-op. The handle is never issued again.
    pub fn delete(&self, handle: K) -> Option<V> {
        let _g = self.reentrancy.enter();
        self.map.remove(&handle).map(|(_, value)| value)
    }

    /// Remove every entry and return how many were removed.
    ///
    /// Holds the counter for the whole sweep, so no insert can land while it
    /// runs. Entries are removed one at a time; concurrent `set` calls may
    /// survive the sweep. The counter is not reset.
    #[tracing::instrument(skip(self), level = tracing::Level::DEBUG)]
    pub fn clear(&self) -> usize {
        let removed: Vec<V> = {
            let _g = self.reentrancy.enter();
            let _issuer = self.counter.lock();
            let handles: Vec<K> = self.map.iter().map(|entry| *entry.key()).collect();
            handles
                .into_iter()
                .filter_map(|handle| self.map.remove(&handle))
                .map(|(_, value)| value)
                .collect()
        };
        tracing::debug!(removed = removed.len(), "cleared handle table");
        removed.len()
    }

    /// Visit entries in unspecified order until `visit` breaks.
    ///
    /// Iteration is weakly consistent: entries inserted or removed while it
    /// runs may or may not be seen, and no entry is visited twice. Each shard
    /// is read-locked while its entries are visited.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(K, &V) -> ControlFlow<()>,
    {
        let _g = self.reentrancy.enter();
        for entry in self.map.iter() {
            if visit(*entry.key(), entry.value()).is_break() {
                break;
            }
        }
    }

    /// Keep only the entries for which `keep` returns true. Each shard is
    /// write-locked while its entries are examined, and rejected values are
    /// dropped under that lock.
    pub fn retain<F>(&self, mut keep: F)
    where
        F: FnMut(K, &mut V) -> bool,
    {
        let _g = self.reentrancy.enter();
        self.map.retain(|&handle, value| keep(handle, value));
    }

    /// Handles currently stored, in unspecified order.
    pub fn handles(&self) -> Vec<K> {
        let _g = self.reentrancy.enter();
        self.map.iter().map(|entry| *entry.key()).collect()
    }

    /// Copies of all entries, in unspecified order. Shards are copied one at
    /// a time, so under concurrent mutation this is not a point-in-time view
    /// of the whole table.
    pub fn snapshot(&self) -> Vec<(K, V)>
    where
        V: Clone,
    {
        let _g = self.reentrancy.enter();
        self.map
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }
}
