//! Property tests for relationship-store invariants

use proptest::prelude::*;
use std::sync::Arc;
use veil_core::testkit::ManualClock;
use veil_core::{MemoryLedger, PrincipalId, ResourceId};
use veil_relational::{RelationKind, RelationshipStore};

#[derive(Debug, Clone)]
enum Op {
    Grant(u8, u8, RelationKind),
    Revoke(u8, u8, RelationKind),
    Hide(u8, u8),
    Unhide(u8, u8),
}

fn arb_kind() -> impl Strategy<Value = RelationKind> {
    prop_oneof![
        Just(RelationKind::Created),
        Just(RelationKind::Member),
        Just(RelationKind::Admin),
        Just(RelationKind::Starred),
        Just(RelationKind::Verified),
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    let small = 0u8..4;
    prop_oneof![
        (small.clone(), small.clone(), arb_kind()).prop_map(|(p, r, k)| Op::Grant(p, r, k)),
        (small.clone(), small.clone(), arb_kind()).prop_map(|(p, r, k)| Op::Revoke(p, r, k)),
        (small.clone(), small.clone()).prop_map(|(p, r)| Op::Hide(p, r)),
        (small.clone(), small).prop_map(|(p, r)| Op::Unhide(p, r)),
    ]
}

fn principal(n: u8) -> PrincipalId {
    PrincipalId::new(format!("p{n}"))
}

fn resource(n: u8) -> ResourceId {
    ResourceId::new(format!("r{n}"))
}

fn run(ops: &[Op]) -> RelationshipStore {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let store = RelationshipStore::new(
        Arc::new(ManualClock::new(1_000)),
        Arc::new(MemoryLedger::new()),
    );
    runtime.block_on(async {
        for op in ops {
            match op {
                Op::Grant(p, r, k) => store.grant(&principal(*p), &resource(*r), *k).await,
                Op::Revoke(p, r, k) => store.revoke(&principal(*p), &resource(*r), *k).await,
                Op::Hide(p, r) => store.hide(&principal(*p), &resource(*r)).await,
                Op::Unhide(p, r) => store.unhide(&principal(*p), &resource(*r)).await,
            }
            .expect("memory-backed ops never fail");
        }
    });
    store
}

proptest! {
    /// Any interleaving of operations leaves at most one live record per
    /// tuple: a listing never reports the same resource twice.
    #[test]
    fn listings_never_duplicate(ops in prop::collection::vec(arb_op(), 0..40)) {
        let store = run(&ops);
        for p in 0..4u8 {
            let listed = store.list(&principal(p), None, true);
            let mut deduped = listed.clone();
            deduped.sort();
            deduped.dedup();
            prop_assert_eq!(listed.len(), deduped.len());
        }
    }

    /// Grants never clear a hidden flag: after any op sequence whose last
    /// pair-affecting op was a hide, the pair is still hidden.
    #[test]
    fn grant_preserves_hidden(ops in prop::collection::vec(arb_op(), 0..30)) {
        // Force the scenario: hide, then arbitrary grants on the same pair.
        let mut script = vec![Op::Grant(0, 0, RelationKind::Member), Op::Hide(0, 0)];
        script.extend(ops.iter().filter(|op| matches!(op, Op::Grant(0, 0, _))).cloned());
        let store = run(&script);
        prop_assert!(store.is_hidden(&principal(0), &resource(0)));
    }

    /// Replaying the committed facts rebuilds the same visible state.
    #[test]
    fn replay_matches_live_state(ops in prop::collection::vec(arb_op(), 0..30)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        let clock = Arc::new(ManualClock::new(1_000));
        let durable = Arc::new(MemoryLedger::new());
        let store = RelationshipStore::new(clock.clone(), durable.clone());

        runtime.block_on(async {
            for op in &ops {
                match op {
                    Op::Grant(p, r, k) => store.grant(&principal(*p), &resource(*r), *k).await,
                    Op::Revoke(p, r, k) => store.revoke(&principal(*p), &resource(*r), *k).await,
                    Op::Hide(p, r) => store.hide(&principal(*p), &resource(*r)).await,
                    Op::Unhide(p, r) => store.unhide(&principal(*p), &resource(*r)).await,
                }
                .expect("memory-backed ops never fail");
            }

            let rebuilt = RelationshipStore::new(clock.clone(), durable.clone());
            rebuilt.replay().await.expect("replay");

            for p in 0..4u8 {
                for r in 0..4u8 {
                    for k in RelationKind::ALL {
                        assert_eq!(
                            store.has(&principal(p), &resource(r), k),
                            rebuilt.has(&principal(p), &resource(r), k),
                        );
                    }
                    assert_eq!(
                        store.is_hidden(&principal(p), &resource(r)),
                        rebuilt.is_hidden(&principal(p), &resource(r)),
                    );
                }
            }
        });
    }
}
