//! Relationship domain facts
//!
//! Fact types for relationship state changes. Facts are append-only: hiding
//! a resource emits a `Hidden` fact rather than rewriting the grant, so the
//! full history stays reconstructible from the ledger.

use serde::{Deserialize, Serialize};
use veil_core::{LedgerFact, PhysicalTime, PrincipalId, ResourceId, Result};

/// Type identifier for relationship facts in the transition ledger.
pub const RELATIONSHIP_FACT_TYPE_ID: &str = "relationship";

/// The closed set of relationship kinds.
///
/// Kinds are independent flags, not a single status: a principal can be both
/// `Created` and `Admin` of the same resource at once. Collapsing them into
/// one enum-valued status per pair would lose that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelationKind {
    /// Principal created the resource
    Created,
    /// Principal is a member of the resource
    Member,
    /// Principal administers the resource
    Admin,
    /// Principal starred/bookmarked the resource
    Starred,
    /// Principal's external identity claim on the resource was verified
    Verified,
}

impl RelationKind {
    /// All kinds, for exhaustive enumeration.
    pub const ALL: [RelationKind; 5] = [
        RelationKind::Created,
        RelationKind::Member,
        RelationKind::Admin,
        RelationKind::Starred,
        RelationKind::Verified,
    ];
}

/// A live relationship tuple, as returned by enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// The acting principal
    pub principal: PrincipalId,
    /// The resource the relationship pertains to
    pub resource: ResourceId,
    /// Relationship kind
    pub kind: RelationKind,
    /// Whether the `(principal, resource)` pair is hidden from display
    pub hidden: bool,
    /// When the tuple was granted
    pub created_at: PhysicalTime,
}

/// Relationship state changes, as appended to the transition ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationshipFact {
    /// Tuple granted
    Granted {
        /// Acting principal
        principal: PrincipalId,
        /// Target resource
        resource: ResourceId,
        /// Relationship kind
        kind: RelationKind,
        /// Grant time
        granted_at: PhysicalTime,
    },
    /// Tuple revoked
    Revoked {
        /// Acting principal
        principal: PrincipalId,
        /// Target resource
        resource: ResourceId,
        /// Relationship kind
        kind: RelationKind,
        /// Revocation time
        revoked_at: PhysicalTime,
    },
    /// Pair hidden from display (all kinds)
    Hidden {
        /// Acting principal
        principal: PrincipalId,
        /// Target resource
        resource: ResourceId,
        /// Hide time
        hidden_at: PhysicalTime,
    },
    /// Pair made visible again
    Unhidden {
        /// Acting principal
        principal: PrincipalId,
        /// Target resource
        resource: ResourceId,
        /// Unhide time
        unhidden_at: PhysicalTime,
    },
}

impl RelationshipFact {
    /// Get the principal from any variant.
    pub fn principal(&self) -> &PrincipalId {
        match self {
            RelationshipFact::Granted { principal, .. } => principal,
            RelationshipFact::Revoked { principal, .. } => principal,
            RelationshipFact::Hidden { principal, .. } => principal,
            RelationshipFact::Unhidden { principal, .. } => principal,
        }
    }

    /// Get the resource from any variant.
    pub fn resource(&self) -> &ResourceId {
        match self {
            RelationshipFact::Granted { resource, .. } => resource,
            RelationshipFact::Revoked { resource, .. } => resource,
            RelationshipFact::Hidden { resource, .. } => resource,
            RelationshipFact::Unhidden { resource, .. } => resource,
        }
    }

    /// Get the timestamp in milliseconds from any variant.
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            RelationshipFact::Granted { granted_at, .. } => granted_at.ts_ms,
            RelationshipFact::Revoked { revoked_at, .. } => revoked_at.ts_ms,
            RelationshipFact::Hidden { hidden_at, .. } => hidden_at.ts_ms,
            RelationshipFact::Unhidden { unhidden_at, .. } => unhidden_at.ts_ms,
        }
    }

    /// Encode for ledger storage under [`RELATIONSHIP_FACT_TYPE_ID`].
    pub fn to_ledger_fact(&self) -> Result<LedgerFact> {
        LedgerFact::encode(RELATIONSHIP_FACT_TYPE_ID, self)
    }
}
