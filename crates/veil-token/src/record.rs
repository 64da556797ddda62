//! Token records and facts

use serde::{Deserialize, Serialize};
use std::fmt;
use veil_core::{LedgerFact, PhysicalTime, Result};

/// Type identifier for token facts in the transition ledger.
pub const TOKEN_FACT_TYPE_ID: &str = "token";

/// The closed set of token purposes.
///
/// A token is only redeemable for the purpose it was issued under; the
/// store key is `(hash, purpose)` so a magic-link token presented to the
/// claim flow is simply not found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TokenPurpose {
    /// Email magic-link sign-in
    MagicLink,
    /// External-identity claim code
    Claim,
    /// Resource invite
    Invite,
}

/// A freshly issued raw bearer token.
///
/// 32 bytes of entropy rendered as 64 hex characters. Not serializable and
/// redacted in `Display`/`Debug` output: the only way to read the secret is
/// an explicit [`RawToken::expose`] at the point of delivery.
#[derive(Clone, PartialEq, Eq)]
pub struct RawToken(String);

impl RawToken {
    /// Wrap a raw token string. Crate-internal; tokens only originate from
    /// issuance.
    pub(crate) fn new(raw: String) -> Self {
        Self(raw)
    }

    /// The raw secret, for handing to the subject exactly once.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RawToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RawToken(redacted)")
    }
}

impl fmt::Display for RawToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("token(redacted)")
    }
}

/// A stored token record. Holds only the one-way hash of the raw token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Domain-separated hash of the raw token
    pub token_hash: String,
    /// Opaque subject the token was issued for (salted digest for PII)
    pub subject_hash: String,
    /// Purpose the token is redeemable under
    pub purpose: TokenPurpose,
    /// Issuance time
    pub issued_at: PhysicalTime,
    /// Expiry instant; the instant itself is already expired
    pub expires_at: PhysicalTime,
    /// Redemption time; set at most once and the sole gate for "redeemed"
    pub used_at: Option<PhysicalTime>,
}

impl TokenRecord {
    /// Valid iff never redeemed and not yet expired.
    pub fn is_valid(&self, now: PhysicalTime) -> bool {
        self.used_at.is_none() && now.is_before(self.expires_at)
    }

    /// Whether the expiry instant has passed.
    pub fn is_expired(&self, now: PhysicalTime) -> bool {
        now.is_at_or_after(self.expires_at)
    }
}

/// Token state changes, as appended to the transition ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenFact {
    /// Token issued
    Issued {
        /// Stored token hash
        token_hash: String,
        /// Opaque subject
        subject_hash: String,
        /// Redeemable purpose
        purpose: TokenPurpose,
        /// Issuance time
        issued_at: PhysicalTime,
        /// Expiry instant
        expires_at: PhysicalTime,
    },
    /// Token redeemed (exactly once per token)
    Redeemed {
        /// Stored token hash
        token_hash: String,
        /// Purpose it was redeemed under
        purpose: TokenPurpose,
        /// Redemption time
        used_at: PhysicalTime,
    },
}

impl TokenFact {
    /// Encode for ledger storage under [`TOKEN_FACT_TYPE_ID`].
    pub fn to_ledger_fact(&self) -> Result<LedgerFact> {
        LedgerFact::encode(TOKEN_FACT_TYPE_ID, self)
    }
}
