#![cfg(test)]

// Property tests for HandleTable kept inside the crate so they can reach
// the map through custom hashers without extra public surface.

use crate::error::InsertError;
use crate::handle_table::HandleTable;
use core::hash::{BuildHasher, Hasher};
use core::ops::ControlFlow;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{BTreeMap, BTreeSet};

// Handles are chosen relative to the current counter so shrinking keeps
// them meaningful: small selectors hit issued handles, larger ones land
// past the counter and exercise out-of-band writes.
#[derive(Clone, Debug)]
enum Op {
    Insert(i32),
    InsertWith(i32),
    Get(u8),
    Set(u8, i32),
    Update(u8, i32),
    Delete(u8),
    Clear,
    Iterate,
    Retain(u8),
}

fn pick(last: u64, sel: u8) -> u64 {
    u64::from(sel) % (last + 4)
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        3 => any::<i32>().prop_map(Op::Insert),
        1 => any::<i32>().prop_map(Op::InsertWith),
        2 => any::<u8>().prop_map(Op::Get),
        2 => (any::<u8>(), any::<i32>()).prop_map(|(h, v)| Op::Set(h, v)),
        1 => (any::<u8>(), any::<i32>()).prop_map(|(h, d)| Op::Update(h, d)),
        2 => any::<u8>().prop_map(Op::Delete),
        1 => Just(Op::Clear),
        1 => Just(Op::Iterate),
        1 => (2u8..5).prop_map(Op::Retain),
    ];
    proptest::collection::vec(op, 1..80)
}

// State-machine equivalence against a BTreeMap plus a model counter.
// Invariants exercised across random operation sequences:
// - Inserts return `last + 1`; no handle is ever issued twice, including
//   after deletes and clears.
// - `get`/`contains_key`/`get_with` parity with the model for issued,
//   deleted, never-issued and out-of-band handles.
// - `set` is last-write-wins and never advances the counter.
// - `delete` returns the model's value and is idempotent.
// - `clear` empties the table and returns the model's size.
// - `for_each` and `snapshot` yield each live entry exactly once.
// - `len`/`is_empty`/`last_issued` parity after each op.
fn run_state_machine<S>(sut: HandleTable<u64, i32, S>, ops: Vec<Op>) -> Result<(), TestCaseError>
where
    S: BuildHasher + Clone,
{
    let mut model: BTreeMap<u64, i32> = BTreeMap::new();
    let mut last: u64 = 0;
    let mut issued: BTreeSet<u64> = BTreeSet::new();

    for op in ops {
        match op {
            Op::Insert(v) => {
                let h = sut.insert(v).expect("u64 handles do not run out here");
                prop_assert_eq!(h, last + 1, "handles must be issued in order");
                prop_assert!(issued.insert(h), "handle issued twice");
                last = h;
                model.insert(h, v);
            }
            Op::InsertWith(v) => {
                let mut calls = 0;
                let h = sut
                    .insert_with(|h| {
                        calls += 1;
                        v.wrapping_add(h as i32)
                    })
                    .expect("u64 handles do not run out here");
                prop_assert_eq!(calls, 1, "constructor must run exactly once");
                prop_assert_eq!(h, last + 1);
                prop_assert!(issued.insert(h), "handle issued twice");
                last = h;
                model.insert(h, v.wrapping_add(h as i32));
            }
            Op::Get(sel) => {
                let h = pick(last, sel);
                prop_assert_eq!(sut.get(h), model.get(&h).copied());
                prop_assert_eq!(sut.contains_key(h), model.contains_key(&h));
                prop_assert_eq!(sut.get_with(h, |v| *v), model.get(&h).copied());
            }
            Op::Set(sel, v) => {
                let h = pick(last, sel);
                prop_assert_eq!(sut.set(h, v), model.insert(h, v));
            }
            Op::Update(sel, d) => {
                let h = pick(last, sel);
                let got = sut.update(h, |v| {
                    *v = v.saturating_add(d);
                    *v
                });
                let expected = model.get_mut(&h).map(|v| {
                    *v = v.saturating_add(d);
                    *v
                });
                prop_assert_eq!(got, expected);
            }
            Op::Delete(sel) => {
                let h = pick(last, sel);
                prop_assert_eq!(sut.delete(h), model.remove(&h));
                prop_assert_eq!(sut.delete(h), None, "delete must be idempotent");
            }
            Op::Clear => {
                prop_assert_eq!(sut.clear(), model.len());
                model.clear();
            }
            Op::Iterate => {
                let mut seen: BTreeMap<u64, i32> = BTreeMap::new();
                sut.for_each(|h, v| {
                    let prev = seen.insert(h, *v);
                    assert!(prev.is_none(), "entry visited twice");
                    ControlFlow::Continue(())
                });
                prop_assert_eq!(&seen, &model);
                let snap: BTreeMap<u64, i32> = sut.snapshot().into_iter().collect();
                prop_assert_eq!(&snap, &model);
                let handles: BTreeSet<u64> = sut.handles().into_iter().collect();
                let model_handles: BTreeSet<u64> = model.keys().copied().collect();
                prop_assert_eq!(handles, model_handles);
            }
            Op::Retain(m) => {
                let m = u64::from(m);
                sut.retain(|h, _| h % m != 0);
                model.retain(|h, _| h % m != 0);
            }
        }

        // Post-conditions after each op
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        prop_assert_eq!(sut.last_issued(), last);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(ops in arb_ops()) {
        run_state_machine(HandleTable::new(), ops)?;
    }
}

// Constant hasher: every handle lands in the same shard and bucket.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Property: Same state-machine invariants as above under worst-case
// collisions, where all entries share one shard lock.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions(ops in arb_ops()) {
        run_state_machine(HandleTable::with_hasher(ConstBuildHasher), ops)?;
    }
}

// Property: a narrow handle type issues exactly its positive range and then
// fails without changing the table, however inserts and deletes interleave.
proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_exhaustion_is_sticky(deletes in proptest::collection::vec(any::<bool>(), 130..200)) {
        let sut: HandleTable<i8, bool> = HandleTable::new();
        let mut issued = 0usize;
        for del in deletes {
            match sut.insert(del) {
                Ok(h) => {
                    issued += 1;
                    prop_assert_eq!(h as usize, issued);
                    if del {
                        prop_assert_eq!(sut.delete(h), Some(true));
                    }
                }
                Err(InsertError::Exhausted) => {
                    prop_assert_eq!(issued, i8::MAX as usize);
                    prop_assert_eq!(sut.last_issued(), i8::MAX);
                }
            }
        }
        prop_assert_eq!(issued, i8::MAX as usize);
        prop_assert_eq!(sut.insert(false), Err(InsertError::Exhausted));
    }
}
