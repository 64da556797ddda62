//! Unified error system for Veil
//!
//! A single error type carries the full failure taxonomy so that internal
//! logic and tests can branch on the specific kind while outward-facing
//! callers collapse kinds as their boundary requires. In particular,
//! `RateLimited` and the token failures (`NotFound`/`Expired`/`AlreadyUsed`)
//! stay distinct here; anti-enumeration surfaces (e.g. a magic-link request
//! endpoint) are expected to fold them into a generic success-shaped
//! response themselves. This crate never does that folding.

use serde::{Deserialize, Serialize};

/// Unified error type for all Veil operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum VeilError {
    /// Invalid input or configuration
    #[error("invalid: {message}")]
    Invalid {
        /// What was malformed
        message: String,
    },

    /// No record matches the lookup
    #[error("not found: {message}")]
    NotFound {
        /// What was looked up
        message: String,
    },

    /// Single-use token was already redeemed
    #[error("already used: {message}")]
    AlreadyUsed {
        /// Which token class was affected
        message: String,
    },

    /// Record exists but its validity window has passed
    #[error("expired: {message}")]
    Expired {
        /// What expired
        message: String,
    },

    /// Caller lacks the relationship or capability the operation requires
    #[error("unauthorized: {message}")]
    Unauthorized {
        /// Which requirement failed
        message: String,
    },

    /// Principal already cast a vote on this proposal
    #[error("already voted: {message}")]
    AlreadyVoted {
        /// Proposal context
        message: String,
    },

    /// Proposal is past its deadline or no longer in the Active state
    #[error("proposal not active: {message}")]
    ProposalNotActive {
        /// Proposal context
        message: String,
    },

    /// State-machine transition requested from a state that forbids it
    #[error("invalid state: {message}")]
    InvalidState {
        /// What transition was attempted
        message: String,
    },

    /// Social post did not contain the expected verification code
    #[error("code mismatch: {message}")]
    CodeMismatch {
        /// Claim context
        message: String,
    },

    /// Social lookup failed, timed out, or returned an oversized response
    #[error("lookup failed: {message}")]
    LookupFailed {
        /// Why the lookup was rejected
        message: String,
    },

    /// Sliding-window limit reached for this key
    #[error("rate limited: {message}")]
    RateLimited {
        /// Which limit tripped
        message: String,
    },

    /// Durable ledger or another upstream collaborator is unavailable.
    ///
    /// Never retried internally: re-attempting a redemption-class operation
    /// after an ambiguous failure is unsafe, so retry policy belongs to the
    /// caller, who can re-check state first.
    #[error("upstream unavailable: {message}")]
    UpstreamUnavailable {
        /// Which upstream failed
        message: String,
    },
}

impl VeilError {
    /// Create an invalid input error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an already used error.
    pub fn already_used(message: impl Into<String>) -> Self {
        Self::AlreadyUsed {
            message: message.into(),
        }
    }

    /// Create an expired error.
    pub fn expired(message: impl Into<String>) -> Self {
        Self::Expired {
            message: message.into(),
        }
    }

    /// Create an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create an already voted error.
    pub fn already_voted(message: impl Into<String>) -> Self {
        Self::AlreadyVoted {
            message: message.into(),
        }
    }

    /// Create a proposal not active error.
    pub fn proposal_not_active(message: impl Into<String>) -> Self {
        Self::ProposalNotActive {
            message: message.into(),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a code mismatch error.
    pub fn code_mismatch(message: impl Into<String>) -> Self {
        Self::CodeMismatch {
            message: message.into(),
        }
    }

    /// Create a lookup failed error.
    pub fn lookup_failed(message: impl Into<String>) -> Self {
        Self::LookupFailed {
            message: message.into(),
        }
    }

    /// Create a rate limited error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    /// Create an upstream unavailable error.
    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
        }
    }
}

/// Result alias used throughout the Veil crates.
pub type Result<T> = std::result::Result<T, VeilError>;
