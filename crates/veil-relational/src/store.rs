//! Relationship store service
//!
//! Materialized relationship state plus the mutation logic. Decisions
//! (does the tuple exist, is the pair hidden) happen under one lock so
//! concurrent duplicate grants converge to a single record; the durable
//! append to the transition ledger happens after the decision and its
//! failure surfaces without corrupting the in-memory view.

use crate::facts::{
    RelationKind, Relationship, RelationshipFact, RELATIONSHIP_FACT_TYPE_ID,
};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use veil_core::{ClockEffects, PhysicalTime, PrincipalId, ResourceId, Result, TransitionLedger};

type TupleKey = (PrincipalId, ResourceId, RelationKind);
type PairKey = (PrincipalId, ResourceId);

#[derive(Debug, Default)]
struct State {
    /// Live tuples, keyed by (principal, resource, kind); value is grant time
    tuples: HashMap<TupleKey, PhysicalTime>,
    /// Pairs the principal has chosen to hide from display
    hidden: HashSet<PairKey>,
}

/// The relationship store.
///
/// Owns relationship records exclusively. Cheap to clone via `Arc` wrapping
/// at the call site; internally all state sits behind one `RwLock`.
pub struct RelationshipStore {
    clock: Arc<dyn ClockEffects>,
    ledger: Arc<dyn TransitionLedger>,
    state: RwLock<State>,
}

impl RelationshipStore {
    /// Create an empty store over the given clock and durable ledger.
    pub fn new(clock: Arc<dyn ClockEffects>, ledger: Arc<dyn TransitionLedger>) -> Self {
        Self {
            clock,
            ledger,
            state: RwLock::new(State::default()),
        }
    }

    /// Rebuild the materialized view from the ledger's committed facts.
    ///
    /// Facts fold in commit order: a grant inserts, a revoke removes, hide
    /// and unhide toggle the pair flag. Call once at startup before serving.
    pub async fn replay(&self) -> Result<()> {
        let facts = self.ledger.read(RELATIONSHIP_FACT_TYPE_ID).await?;
        let mut state = self.state.write();
        *state = State::default();
        for raw in facts {
            let fact: RelationshipFact = raw.decode()?;
            match fact {
                RelationshipFact::Granted {
                    principal,
                    resource,
                    kind,
                    granted_at,
                } => {
                    state
                        .tuples
                        .entry((principal, resource, kind))
                        .or_insert(granted_at);
                }
                RelationshipFact::Revoked {
                    principal,
                    resource,
                    kind,
                    ..
                } => {
                    state.tuples.remove(&(principal, resource, kind));
                }
                RelationshipFact::Hidden {
                    principal, resource, ..
                } => {
                    state.hidden.insert((principal, resource));
                }
                RelationshipFact::Unhidden {
                    principal, resource, ..
                } => {
                    state.hidden.remove(&(principal, resource));
                }
            }
        }
        Ok(())
    }

    /// Grant a relationship tuple. Idempotent: if the tuple already exists
    /// the call is a no-op, and an existing hidden flag is left untouched —
    /// hiding was a deliberate user action and an unrelated grant must not
    /// silently undo it.
    pub async fn grant(
        &self,
        principal: &PrincipalId,
        resource: &ResourceId,
        kind: RelationKind,
    ) -> Result<()> {
        let now = self.clock.now().await;
        let inserted = {
            let mut state = self.state.write();
            let key = (principal.clone(), resource.clone(), kind);
            match state.tuples.entry(key) {
                std::collections::hash_map::Entry::Occupied(_) => false,
                std::collections::hash_map::Entry::Vacant(entry) => {
                    entry.insert(now);
                    true
                }
            }
        };

        if !inserted {
            tracing::debug!(%principal, %resource, ?kind, "grant no-op, tuple exists");
            return Ok(());
        }

        tracing::debug!(%principal, %resource, ?kind, "relationship granted");
        self.ledger
            .apply(
                RelationshipFact::Granted {
                    principal: principal.clone(),
                    resource: resource.clone(),
                    kind,
                    granted_at: now,
                }
                .to_ledger_fact()?,
            )
            .await
    }

    /// Revoke a relationship tuple. Removing a non-existent tuple is a
    /// no-op, not an error. The hidden flag is independent and survives.
    pub async fn revoke(
        &self,
        principal: &PrincipalId,
        resource: &ResourceId,
        kind: RelationKind,
    ) -> Result<()> {
        let now = self.clock.now().await;
        let removed = {
            let mut state = self.state.write();
            state
                .tuples
                .remove(&(principal.clone(), resource.clone(), kind))
                .is_some()
        };

        if !removed {
            return Ok(());
        }

        tracing::debug!(%principal, %resource, ?kind, "relationship revoked");
        self.ledger
            .apply(
                RelationshipFact::Revoked {
                    principal: principal.clone(),
                    resource: resource.clone(),
                    kind,
                    revoked_at: now,
                }
                .to_ledger_fact()?,
            )
            .await
    }

    /// Hide a `(principal, resource)` pair from display, across all kinds.
    /// Suppresses display only; no history is deleted. Idempotent.
    pub async fn hide(&self, principal: &PrincipalId, resource: &ResourceId) -> Result<()> {
        let now = self.clock.now().await;
        let newly_hidden = {
            let mut state = self.state.write();
            state.hidden.insert((principal.clone(), resource.clone()))
        };

        if !newly_hidden {
            return Ok(());
        }

        self.ledger
            .apply(
                RelationshipFact::Hidden {
                    principal: principal.clone(),
                    resource: resource.clone(),
                    hidden_at: now,
                }
                .to_ledger_fact()?,
            )
            .await
    }

    /// Make a hidden pair visible again. Idempotent.
    pub async fn unhide(&self, principal: &PrincipalId, resource: &ResourceId) -> Result<()> {
        let now = self.clock.now().await;
        let was_hidden = {
            let mut state = self.state.write();
            state.hidden.remove(&(principal.clone(), resource.clone()))
        };

        if !was_hidden {
            return Ok(());
        }

        self.ledger
            .apply(
                RelationshipFact::Unhidden {
                    principal: principal.clone(),
                    resource: resource.clone(),
                    unhidden_at: now,
                }
                .to_ledger_fact()?,
            )
            .await
    }

    /// Whether the pair is hidden from display.
    pub fn is_hidden(&self, principal: &PrincipalId, resource: &ResourceId) -> bool {
        self.state
            .read()
            .hidden
            .contains(&(principal.clone(), resource.clone()))
    }

    /// Resources related to `principal`, optionally filtered by kind.
    ///
    /// Order is unspecified; callers needing stable order sort by
    /// `created_at` via [`RelationshipStore::relationships_of`].
    pub fn list(
        &self,
        principal: &PrincipalId,
        kind: Option<RelationKind>,
        include_hidden: bool,
    ) -> Vec<ResourceId> {
        let state = self.state.read();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (p, r, k) in state.tuples.keys() {
            if p != principal {
                continue;
            }
            if let Some(want) = kind {
                if *k != want {
                    continue;
                }
            }
            if !include_hidden && state.hidden.contains(&(p.clone(), r.clone())) {
                continue;
            }
            if seen.insert(r.clone()) {
                out.push(r.clone());
            }
        }
        out
    }

    /// Principals holding `kind` on `resource`. Used by the tally engine to
    /// snapshot an electorate; hidden flags do not affect eligibility.
    pub fn list_principals(&self, resource: &ResourceId, kind: RelationKind) -> Vec<PrincipalId> {
        let state = self.state.read();
        state
            .tuples
            .keys()
            .filter(|(_, r, k)| r == resource && *k == kind)
            .map(|(p, _, _)| p.clone())
            .collect()
    }

    /// Full relationship records for `principal`, including hidden ones.
    pub fn relationships_of(&self, principal: &PrincipalId) -> Vec<Relationship> {
        let state = self.state.read();
        state
            .tuples
            .iter()
            .filter(|((p, _, _), _)| p == principal)
            .map(|((p, r, k), created_at)| Relationship {
                principal: p.clone(),
                resource: r.clone(),
                kind: *k,
                hidden: state.hidden.contains(&(p.clone(), r.clone())),
                created_at: *created_at,
            })
            .collect()
    }

    /// Whether the exact tuple is live.
    pub fn has(&self, principal: &PrincipalId, resource: &ResourceId, kind: RelationKind) -> bool {
        self.state
            .read()
            .tuples
            .contains_key(&(principal.clone(), resource.clone(), kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_core::testkit::ManualClock;
    use veil_core::MemoryLedger;

    fn store() -> RelationshipStore {
        RelationshipStore::new(
            Arc::new(ManualClock::new(1_000)),
            Arc::new(MemoryLedger::new()),
        )
    }

    #[tokio::test]
    async fn test_grant_is_idempotent() {
        let store = store();
        let p = PrincipalId::new("agent1");
        let r = ResourceId::new("cloak1");

        store.grant(&p, &r, RelationKind::Member).await.unwrap();
        store.grant(&p, &r, RelationKind::Member).await.unwrap();

        assert_eq!(store.list(&p, Some(RelationKind::Member), false).len(), 1);
    }

    #[tokio::test]
    async fn test_kinds_are_independent_flags() {
        let store = store();
        let p = PrincipalId::new("agent1");
        let r = ResourceId::new("cloak1");

        store.grant(&p, &r, RelationKind::Created).await.unwrap();
        store.grant(&p, &r, RelationKind::Admin).await.unwrap();

        assert!(store.has(&p, &r, RelationKind::Created));
        assert!(store.has(&p, &r, RelationKind::Admin));
        // One resource even though two kinds are live.
        assert_eq!(store.list(&p, None, false).len(), 1);
    }

    #[tokio::test]
    async fn test_grant_does_not_unhide() {
        let store = store();
        let p = PrincipalId::new("agent1");
        let r = ResourceId::new("cloak1");

        store.grant(&p, &r, RelationKind::Member).await.unwrap();
        store.hide(&p, &r).await.unwrap();
        store.grant(&p, &r, RelationKind::Starred).await.unwrap();

        assert!(store.is_hidden(&p, &r));
        assert!(store.list(&p, None, false).is_empty());
        assert_eq!(store.list(&p, None, true).len(), 1);
    }

    #[tokio::test]
    async fn test_revoke_missing_is_noop() {
        let store = store();
        let p = PrincipalId::new("agent1");
        let r = ResourceId::new("cloak1");

        assert!(store.revoke(&p, &r, RelationKind::Member).await.is_ok());
    }

    #[tokio::test]
    async fn test_hide_survives_revoke_and_regrant() {
        let store = store();
        let p = PrincipalId::new("agent1");
        let r = ResourceId::new("cloak1");

        store.grant(&p, &r, RelationKind::Member).await.unwrap();
        store.hide(&p, &r).await.unwrap();
        store.revoke(&p, &r, RelationKind::Member).await.unwrap();
        store.grant(&p, &r, RelationKind::Member).await.unwrap();

        assert!(store.is_hidden(&p, &r));
    }

    #[tokio::test]
    async fn test_unhide_restores_listing() {
        let store = store();
        let p = PrincipalId::new("agent1");
        let r = ResourceId::new("cloak1");

        store.grant(&p, &r, RelationKind::Member).await.unwrap();
        store.hide(&p, &r).await.unwrap();
        store.unhide(&p, &r).await.unwrap();

        assert_eq!(store.list(&p, None, false).len(), 1);
    }

    #[tokio::test]
    async fn test_list_principals_for_resource() {
        let store = store();
        let r = ResourceId::new("cloak1");

        for name in ["a", "b", "c"] {
            store
                .grant(&PrincipalId::new(name), &r, RelationKind::Member)
                .await
                .unwrap();
        }
        store
            .grant(&PrincipalId::new("d"), &r, RelationKind::Starred)
            .await
            .unwrap();

        let members = store.list_principals(&r, RelationKind::Member);
        assert_eq!(members.len(), 3);
        assert!(!members.contains(&PrincipalId::new("d")));
    }

    #[tokio::test]
    async fn test_replay_rebuilds_view() {
        let ledger = Arc::new(MemoryLedger::new());
        let clock = Arc::new(ManualClock::new(1_000));
        let p = PrincipalId::new("agent1");
        let r = ResourceId::new("cloak1");

        {
            let store = RelationshipStore::new(clock.clone(), ledger.clone());
            store.grant(&p, &r, RelationKind::Member).await.unwrap();
            store.grant(&p, &r, RelationKind::Admin).await.unwrap();
            store.revoke(&p, &r, RelationKind::Admin).await.unwrap();
            store.hide(&p, &r).await.unwrap();
        }

        let rebuilt = RelationshipStore::new(clock, ledger);
        rebuilt.replay().await.unwrap();

        assert!(rebuilt.has(&p, &r, RelationKind::Member));
        assert!(!rebuilt.has(&p, &r, RelationKind::Admin));
        assert!(rebuilt.is_hidden(&p, &r));
    }

    #[tokio::test]
    async fn test_concurrent_grants_converge_to_one_record() {
        let store = Arc::new(store());
        let p = PrincipalId::new("agent1");
        let r = ResourceId::new("cloak1");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            let p = p.clone();
            let r = r.clone();
            handles.push(tokio::spawn(async move {
                store.grant(&p, &r, RelationKind::Member).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.list(&p, Some(RelationKind::Member), false).len(), 1);
    }
}
