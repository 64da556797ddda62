//! Veil Tally - Proposal Tallying & Quorum Evaluation
//!
//! Per-proposal vote counts with anti-double-counting and quorum rules.
//! Each proposal runs a small one-way state machine:
//!
//! ```text
//! Active --finalize--> Passed --execute--> Executed
//!        \-finalize--> Rejected
//! ```
//!
//! Key guarantees:
//!
//! - One vote per `(proposal, principal)`, enforced by check-and-insert
//!   inside a single critical section — never by a read-then-write race
//! - Voting weight is snapshotted into the proposal at creation time and
//!   never read live at vote time, so later relationship changes cannot
//!   manipulate an open proposal's electorate
//! - A vote at the deadline instant is rejected (`now >= deadline` counts
//!   as past), so nothing races the boundary
//! - Zero votes at deadline always fails quorum; nothing passes by default
//! - `execute` is the single point where a passed proposal's side effect is
//!   applied, by the caller; the record itself never acts implicitly
//!
//! Authorization reads `veil-relational` (who is a Member/Admin) but never
//! mutates it.

#![forbid(unsafe_code)]

pub mod engine;
pub mod proposal;

pub use engine::{TallyCounts, TallyEngine};
pub use proposal::{
    Proposal, ProposalKind, ProposalStatus, TallyConfig, TallyFact, TallyRules, Vote,
    TALLY_FACT_TYPE_ID,
};
