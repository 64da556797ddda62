//! Veil Claim - External-Identity Claim Verification
//!
//! Links an external identity (a social account) to a principal by
//! composing three collaborators:
//!
//! 1. `veil-token` issues a claim token and this crate derives a short,
//!    human-postable verification code from it
//! 2. The claimant posts the code on the social network; [`SocialLookup`]
//!    fetches the post (bounded size, bounded time, fail closed)
//! 3. On a code match the claim token is redeemed and a `Verified`
//!    relationship is recorded in `veil-relational`
//!
//! The posted code is a one-way derivation of the token, never the token
//! itself: a publicly visible code cannot be redeemed. Redemption still
//! requires presenting the original claim token through the authenticated
//! flow.

#![forbid(unsafe_code)]

pub mod lookup;
pub mod verifier;

pub use lookup::{LookupConfig, SocialLookup};
pub use verifier::{ClaimConfig, ClaimIssuance, ClaimVerifier};
