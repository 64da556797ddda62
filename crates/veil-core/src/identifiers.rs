//! Core identifier types used across the Veil ledger
//!
//! Principals and resources are opaque strings: an account address, a salted
//! email digest, an org/cloak address. The newtypes exist so the type system
//! keeps "who" and "what" apart; nothing in Veil ever interprets the inner
//! string beyond equality.

use crate::hash;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// An opaque identity performing actions (account address or hashed email).
///
/// No cleartext PII: email-based principals must be built with
/// [`PrincipalId::from_email`], which stores only a salted digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Wrap an already-opaque identity (e.g. an on-chain account address).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build a principal from an email address, storing only the salted
    /// SHA-256 digest of the lowercased address.
    pub fn from_email(salt: &str, email: &str) -> Self {
        Self(hash::subject_hash(salt, email))
    }

    /// The opaque identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "principal-{}", self.0)
    }
}

impl From<&str> for PrincipalId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// An opaque identity naming the entity a relationship or vote pertains to
/// (e.g. a cloak/org address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(String);

impl ResourceId {
    /// Wrap an opaque resource address.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The opaque resource string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource-{}", self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identifier for a governance proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProposalId(pub Uuid);

impl ProposalId {
    /// Build a v4-style id from injected entropy bytes.
    ///
    /// Callers draw the bytes from an [`crate::EntropyEffects`] handle so id
    /// generation stays deterministic under test handlers.
    pub fn from_entropy(bytes: [u8; 16]) -> Self {
        let mut b = bytes;
        // Set UUID version (4) and variant (RFC 4122) bits.
        b[6] = (b[6] & 0x0f) | 0x40;
        b[8] = (b[8] & 0x3f) | 0x80;
        Self(Uuid::from_bytes(b))
    }

    /// Create from a UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proposal-{}", self.0)
    }
}

impl From<Uuid> for ProposalId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}
