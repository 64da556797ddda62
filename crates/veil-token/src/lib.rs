//! Veil Token - Single-Use Bearer Tokens
//!
//! Issues, stores, and redeems single-use, TTL-boxed bearer tokens: magic
//! links, claim codes, invites. Core guarantees:
//!
//! - The raw token leaves [`TokenLedger::issue`] exactly once and is never
//!   persisted; only its domain-separated hash is stored
//! - Redemption is an atomic check-and-set on `used_at`: exactly one of any
//!   number of concurrent redeemers succeeds, the rest observe `AlreadyUsed`
//! - Expiry is computed at read time; no background sweep is required
//!
//! Rate limiting is deliberately *not* done here. It is per-call-site
//! policy: the issuance caller gates on [`veil_core::RateLimiter`] first.
//!
//! `NotFound`, `AlreadyUsed`, and `Expired` stay distinct for internal
//! callers and tests; collapsing them into one generic failure (to avoid
//! leaking which emails exist) is the outward HTTP boundary's job.

#![forbid(unsafe_code)]

pub mod ledger;
pub mod record;

pub use ledger::TokenLedger;
pub use record::{RawToken, TokenFact, TokenPurpose, TokenRecord, TOKEN_FACT_TYPE_ID};
