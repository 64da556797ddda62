//! Veil Core - Foundation Layer
//!
//! This crate provides the foundational types and effect interfaces shared by
//! the Veil relationship and tally ledger:
//!
//! - Identifiers: `PrincipalId`, `ResourceId`, `ProposalId`
//! - Unified error handling: `VeilError`, `Result`
//! - Physical time: `PhysicalTime` with millisecond precision
//! - Effect interfaces: `ClockEffects`, `EntropyEffects`, `TransitionLedger`
//! - Sliding-window rate limiting: `RateLimiter`
//!
//! # Architecture
//!
//! This is a **Layer 1 (Foundation)** crate. It has no dependencies on other
//! Veil crates; everything above it (`veil-relational`, `veil-tally`,
//! `veil-token`, `veil-claim`) builds on the types and traits defined here.
//!
//! Effect interfaces follow the handler pattern: pure trait signatures with
//! production implementations (`SystemClock`, `OsEntropy`, `MemoryLedger`)
//! alongside, and deterministic test handlers in the hidden `testkit` module.
//! Components receive effect handles at construction time; no component
//! reaches for ambient global state.

#![forbid(unsafe_code)]

pub mod effects;
pub mod errors;
pub mod hash;
pub mod identifiers;
pub mod rate_limit;
pub mod time;

/// Deterministic effect handlers for tests (manual clock, fixed entropy).
#[doc(hidden)]
pub mod testkit;

pub use effects::{
    ClockEffects, EntropyEffects, LedgerFact, MemoryLedger, OsEntropy, SystemClock,
    TransitionLedger,
};
pub use errors::{Result, VeilError};
pub use identifiers::{PrincipalId, ProposalId, ResourceId};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use time::PhysicalTime;
