//! handle-table: a concurrent table that stores values under integer
//! handles it issues itself.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: hand out handles that never collide or repeat, while keeping
//!   reads, writes and deletes free of any table-wide lock.
//! - Layers:
//!   - `Handle`: the integer key types a table can issue; knows its zero
//!     and its checked successor.
//!   - `HandleCounter<K>`: monotonic counter behind a `parking_lot` mutex.
//!     Its guard is the single serialization point for inserts and
//!     `clear`.
//!   - `HandleTable<K, V, S>`: public API. Composes the counter with a
//!     sharded `DashMap<K, V, S>`; every data-path operation goes straight
//!     to the map and contends only on one shard lock.
//!
//! Constraints
//! - Thread-safe: every operation takes `&self`; the table is `Send`/`Sync`
//!   whenever `K`, `V` and `S` are.
//! - Handles are unique for the lifetime of a table. Deleting or clearing
//!   never returns a handle to the pool and never resets the counter.
//! - Values are opaque to the table; any `V` works. Operations that hand
//!   out copies (`get`, `snapshot`) require `V: Clone`; `get_with` and
//!   `update` work on the stored value in place.
//!
//! Consistency
//! - Inserts are linearizable with respect to each other and to `clear`.
//! - `for_each`, `handles`, `snapshot` and `len` are weakly consistent:
//!   they see each shard at a slightly different moment, so entries added
//!   or removed concurrently may or may not be observed. No entry is
//!   visited twice.
//! - `clear` removes entries one at a time under the counter guard. A
//!   concurrent `set` may survive it; a concurrent insert cannot.
//!
//! Out-of-band handles
//! - `set` writes any handle without consulting the counter. A handle above
//!   `last_issued()` written this way is replaced when the counter reaches
//!   it.
//!
//! Overflow semantics
//! - The counter never wraps. Once it holds the largest value of `K`,
//!   inserts fail with `InsertError::Exhausted` and leave the table
//!   unchanged.
//!
//! Reentrancy policy
//! - Closures passed to `insert_with`, `get_with`, `update`, `for_each` and
//!   `retain` run under the counter mutex or a shard lock. Calling back into
//!   the same table from them would deadlock; a debug-only, per-thread
//!   reentrancy guard at the start of each method turns that into a panic.
//! - Values displaced by `set`, removed by `delete` or `clear`, or replaced
//!   by an insert are handed back or dropped after every lock is released,
//!   so their `Drop` may use the table. `retain` is the exception: it drops
//!   rejected values under the shard lock.
//!
//! Notes and non-goals
//! - No persistence, eviction or size bounds.
//! - No ordering guarantee across handles during iteration.
//! - Public API surface is `HandleTable`, the `Handle` trait, `InsertError`
//!   and the two aliases below; the counter and guard are implementation
//!   details.

mod counter;
mod error;
mod handle;
pub mod handle_table;
mod handle_table_proptest;
mod reentrancy;

// Public surface
pub use error::InsertError;
pub use handle::Handle;
pub use handle_table::HandleTable;

/// Handle table keyed by 64-bit unsigned handles.
pub type U64HandleTable<V, S = std::collections::hash_map::RandomState> = HandleTable<u64, V, S>;

/// Handle table keyed by native signed integer handles.
pub type IsizeHandleTable<V, S = std::collections::hash_map::RandomState> =
    HandleTable<isize, V, S>;
