//! Veil Relational - Relationship Store
//!
//! Maintains the set of `(principal, resource, kind)` relationship tuples
//! with privacy and de-duplication guarantees:
//!
//! - Grants are idempotent unions: adding an existing tuple is a no-op,
//!   never an error and never an overwrite
//! - A pair-level hidden flag suppresses display without deleting history
//!   ("forget this resource"), and is never cleared by an unrelated grant
//! - Revoking a missing tuple is a no-op
//!
//! # Architecture
//!
//! Facts (data) live in [`facts`]; the service (logic) lives in [`store`].
//! The store keeps a materialized view under a lock for atomic decisions and
//! appends every accepted mutation to the injected durable
//! [`veil_core::TransitionLedger`]. The view can be rebuilt from the ledger
//! at startup via [`RelationshipStore::replay`].
//!
//! This crate owns relationship records exclusively. `veil-tally` reads them
//! (to authorize voters) but never mutates them.

#![forbid(unsafe_code)]

pub mod facts;
pub mod store;

pub use facts::{RelationKind, Relationship, RelationshipFact, RELATIONSHIP_FACT_TYPE_ID};
pub use store::RelationshipStore;
