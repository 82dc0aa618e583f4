use handle_table::{HandleTable, InsertError, IsizeHandleTable, U64HandleTable};
use std::ops::ControlFlow;
use std::sync::Arc;

#[test]
fn insert_get_delete_reinsert_scenario() {
    let t: U64HandleTable<&str> = HandleTable::new();
    assert_eq!(t.insert("a"), Ok(1));
    assert_eq!(t.insert("b"), Ok(2));
    assert_eq!(t.get(1), Some("a"));

    t.delete(1);
    assert_eq!(t.get(1), None);

    // Deleted handles are retired, not recycled.
    assert_eq!(t.insert("c"), Ok(3));
    assert_eq!(t.get(2), Some("b"));
    assert_eq!(t.get(3), Some("c"));
}

#[test]
fn isize_variant_has_identical_behavior() {
    let t: IsizeHandleTable<&str> = HandleTable::default();
    assert_eq!(t.insert("a"), Ok(1));
    assert_eq!(t.insert("b"), Ok(2));
    assert_eq!(t.get(1), Some("a"));
    t.delete(1);
    assert_eq!(t.get(1), None);
    assert_eq!(t.insert("c"), Ok(3));
    assert_eq!(t.last_issued(), 3);
}

#[test]
fn get_on_never_inserted_handle_is_none() {
    let t: U64HandleTable<String> = HandleTable::new();
    assert_eq!(t.get(0), None);
    assert_eq!(t.get(1), None);
    assert_eq!(t.get(u64::MAX), None);
    t.insert("x".to_string()).unwrap();
    assert_eq!(t.get(2), None);
}

#[test]
fn handles_do_not_cross_tables() {
    let a: U64HandleTable<&str> = HandleTable::new();
    let b: U64HandleTable<&str> = HandleTable::new();
    let ha = a.insert("only in a").unwrap();
    assert_eq!(b.get(ha), None);
    assert!(!b.contains_key(ha));
}

#[test]
fn delete_twice_is_harmless() {
    let t: U64HandleTable<i32> = HandleTable::new();
    let h = t.insert(1).unwrap();
    assert_eq!(t.delete(h), Some(1));
    assert_eq!(t.delete(h), None);
    assert_eq!(t.get(h), None);
}

#[test]
fn set_last_write_wins_and_consumes_no_handle() {
    let t: U64HandleTable<&str> = HandleTable::new();
    let h = t.insert("v0").unwrap();
    t.set(h, "v1");
    t.set(h, "v2");
    assert_eq!(t.get(h), Some("v2"));
    assert_eq!(t.last_issued(), h);
    assert_eq!(t.insert("next"), Ok(h + 1));
}

#[test]
fn clear_then_iterate_visits_nothing_and_counter_survives() {
    let t: U64HandleTable<u32> = HandleTable::new();
    let issued: Vec<u64> = (0..100).map(|v| t.insert(v).unwrap()).collect();
    let max_before = *issued.iter().max().unwrap();

    assert_eq!(t.clear(), 100);

    let mut visits = 0;
    t.for_each(|_, _| {
        visits += 1;
        ControlFlow::Continue(())
    });
    assert_eq!(visits, 0);
    assert!(t.handles().is_empty());

    let next = t.insert(0).unwrap();
    assert!(next > max_before);
    for h in issued {
        assert_eq!(t.get(h), None);
    }
}

#[test]
fn narrow_handle_type_reports_exhaustion() {
    let t: HandleTable<u8, u32> = HandleTable::new();
    for i in 1..=255u32 {
        assert_eq!(t.insert(i), Ok(i as u8));
    }
    assert_eq!(t.insert(256), Err(InsertError::Exhausted));
    assert_eq!(t.len(), 255);
    assert_eq!(t.last_issued(), 255);

    // Clearing does not make handles available again.
    t.clear();
    assert_eq!(t.insert(257), Err(InsertError::Exhausted));
    assert!(t.is_empty());
}

#[test]
fn exhaustion_error_is_displayable() {
    let err = InsertError::Exhausted;
    let msg = err.to_string();
    assert!(msg.contains("exhausted"), "unexpected message: {msg}");
    let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(err);
    assert!(std::error::Error::source(&*boxed).is_none());
}

#[test]
fn shared_payloads_via_arc() {
    #[derive(Debug)]
    struct Session {
        user: String,
    }

    let t: U64HandleTable<Arc<Session>> = HandleTable::new();
    let h = t
        .insert(Arc::new(Session {
            user: "alice".to_string(),
        }))
        .unwrap();

    let a = t.get(h).unwrap();
    let b = t.get(h).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.user, "alice");

    // Replacing the entry does not affect copies already handed out.
    t.set(
        h,
        Arc::new(Session {
            user: "bob".to_string(),
        }),
    );
    assert_eq!(a.user, "alice");
    assert_eq!(t.get_with(h, |s| s.user.clone()), Some("bob".to_string()));
}

#[test]
fn value_can_record_its_own_handle() {
    #[derive(Clone, Debug, PartialEq)]
    struct Node {
        id: u64,
        parent: Option<u64>,
    }

    let t: U64HandleTable<Node> = HandleTable::new();
    let root = t.insert_with(|id| Node { id, parent: None }).unwrap();
    let child = t
        .insert_with(|id| Node {
            id,
            parent: Some(root),
        })
        .unwrap();

    let node = t.get(child).unwrap();
    assert_eq!(node.id, child);
    assert_eq!(node.parent, Some(root));
    assert_eq!(t.get(root).unwrap().id, root);
}

#[test]
fn retain_is_the_way_to_delete_while_iterating() {
    let t: U64HandleTable<String> = HandleTable::new();
    for word in ["keep", "drop", "keep", "drop", "keep"] {
        t.insert(word.to_string()).unwrap();
    }
    t.retain(|_, v| *v == "keep");
    assert_eq!(t.len(), 3);

    let mut handles = t.handles();
    handles.sort_unstable();
    assert_eq!(handles, vec![1, 3, 5]);
}

#[test]
fn snapshot_is_detached_from_table() {
    let t: U64HandleTable<i32> = HandleTable::new();
    let h1 = t.insert(10).unwrap();
    let h2 = t.insert(20).unwrap();

    let mut snap = t.snapshot();
    snap.sort_unstable();
    t.delete(h1);
    t.update(h2, |v| *v += 1);

    assert_eq!(snap, vec![(h1, 10), (h2, 20)]);
    assert_eq!(t.snapshot(), vec![(h2, 21)]);
}
