//! Proposal, vote, and tally-rule types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use veil_core::{LedgerFact, PhysicalTime, PrincipalId, ProposalId, ResourceId, Result};

/// Type identifier for tally facts in the transition ledger.
pub const TALLY_FACT_TYPE_ID: &str = "tally";

/// The closed set of proposal kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalKind {
    /// Free-form text proposal, simple majority
    General,
    /// Change to a governed parameter (e.g. a rate-limit window), supermajority
    ParameterChange,
    /// Change to membership policy, supermajority
    MembershipPolicy,
}

/// Proposal lifecycle states. Transitions are monotonic and one-directional:
/// `Active -> {Passed, Rejected}`, `Passed -> Executed`. There is no way out
/// of `Rejected` or `Executed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    /// Open for votes until the deadline
    Active,
    /// Met quorum and threshold at finalization
    Passed,
    /// Failed quorum or threshold at finalization
    Rejected,
    /// Side effect applied by an authorized executor
    Executed,
}

/// Quorum and threshold rules for one proposal.
///
/// A proposal passes iff `for + against >= quorum` and
/// `for * threshold_den > (for + against) * threshold_num`. With the 1/2
/// threshold that reduces to a strict simple majority (`for > against`,
/// ties fail); 2/3 encodes the stricter supermajority templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyRules {
    /// Minimum total cast weight for the result to be binding
    pub quorum: u64,
    /// Threshold numerator
    pub threshold_num: u32,
    /// Threshold denominator
    pub threshold_den: u32,
}

impl TallyRules {
    /// Strict simple majority at the given quorum.
    pub fn simple_majority(quorum: u64) -> Self {
        Self {
            quorum,
            threshold_num: 1,
            threshold_den: 2,
        }
    }

    /// Two-thirds supermajority at the given quorum.
    pub fn supermajority(quorum: u64) -> Self {
        Self {
            quorum,
            threshold_num: 2,
            threshold_den: 3,
        }
    }

    /// Evaluate the pass condition. Zero total always fails quorum.
    pub fn passes(&self, for_weight: u64, against_weight: u64) -> bool {
        let total = for_weight.saturating_add(against_weight);
        if total == 0 || total < self.quorum {
            return false;
        }
        (for_weight as u128) * (self.threshold_den as u128)
            > (total as u128) * (self.threshold_num as u128)
    }
}

/// Per-kind tally rules, applied at proposal creation.
#[derive(Debug, Clone, Copy)]
pub struct TallyConfig {
    /// Quorum applied to every kind
    pub quorum: u64,
}

impl TallyConfig {
    /// Rules for a proposal of the given kind.
    pub fn rules_for(&self, kind: ProposalKind) -> TallyRules {
        match kind {
            ProposalKind::General => TallyRules::simple_majority(self.quorum),
            ProposalKind::ParameterChange => TallyRules::supermajority(self.quorum),
            ProposalKind::MembershipPolicy => TallyRules::supermajority(self.quorum),
        }
    }
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self { quorum: 1 }
    }
}

/// A governance proposal with its creation-time electorate snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Proposal identifier
    pub id: ProposalId,
    /// Resource the proposal governs
    pub resource: ResourceId,
    /// Proposal kind (fixes the threshold template)
    pub kind: ProposalKind,
    /// Free-form proposal content
    pub content: String,
    /// Creation time
    pub created_at: PhysicalTime,
    /// Voting closes at this instant (the instant itself is closed)
    pub deadline_at: PhysicalTime,
    /// When voting weights were captured (equals `created_at`)
    pub snapshot_at: PhysicalTime,
    /// Quorum and threshold in force for this proposal
    pub rules: TallyRules,
    /// Electorate weights captured at `snapshot_at`; only these principals
    /// may vote, at these weights
    pub snapshot_weights: BTreeMap<PrincipalId, u64>,
    /// Lifecycle state
    pub status: ProposalStatus,
}

impl Proposal {
    /// Snapshot weight for `principal`, if they are in the electorate.
    pub fn snapshot_weight(&self, principal: &PrincipalId) -> Option<u64> {
        self.snapshot_weights.get(principal).copied()
    }
}

/// A cast vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// Proposal voted on
    pub proposal_id: ProposalId,
    /// Voting principal
    pub principal: PrincipalId,
    /// For (`true`) or against (`false`)
    pub support: bool,
    /// Weight as of the proposal snapshot, not vote time
    pub weight: u64,
    /// When the vote was cast
    pub cast_at: PhysicalTime,
}

/// Tally state changes, as appended to the transition ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TallyFact {
    /// Proposal created with its snapshot
    ProposalCreated {
        /// The full proposal record, including the electorate snapshot
        proposal: Proposal,
    },
    /// Vote cast
    VoteCast {
        /// The cast vote
        vote: Vote,
    },
    /// Proposal finalized at or after its deadline
    Finalized {
        /// Finalized proposal
        proposal_id: ProposalId,
        /// Resulting status (`Passed` or `Rejected`)
        status: ProposalStatus,
        /// When finalization ran
        finalized_at: PhysicalTime,
    },
    /// Passed proposal executed
    Executed {
        /// Executed proposal
        proposal_id: ProposalId,
        /// Authorized executor
        executor: PrincipalId,
        /// When execution ran
        executed_at: PhysicalTime,
    },
}

impl TallyFact {
    /// Encode for ledger storage under [`TALLY_FACT_TYPE_ID`].
    pub fn to_ledger_fact(&self) -> Result<LedgerFact> {
        LedgerFact::encode(TALLY_FACT_TYPE_ID, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_majority_strictly_beats_ties() {
        let rules = TallyRules::simple_majority(1);
        assert!(rules.passes(2, 1));
        assert!(!rules.passes(2, 2));
        assert!(!rules.passes(1, 2));
    }

    #[test]
    fn test_quorum_gates_regardless_of_split() {
        let rules = TallyRules::simple_majority(100);
        // 40 for, 30 against: majority for, but total 70 < 100.
        assert!(!rules.passes(40, 30));
        assert!(rules.passes(60, 40));
    }

    #[test]
    fn test_zero_votes_never_pass() {
        let rules = TallyRules::simple_majority(0);
        assert!(!rules.passes(0, 0));
    }

    #[test]
    fn test_supermajority_requires_two_thirds() {
        let rules = TallyRules::supermajority(1);
        // Exactly two thirds fails (strict inequality).
        assert!(!rules.passes(2, 1));
        assert!(rules.passes(3, 1));
    }

    #[test]
    fn test_rules_for_kind_templates() {
        let config = TallyConfig { quorum: 10 };
        assert_eq!(
            config.rules_for(ProposalKind::General),
            TallyRules::simple_majority(10)
        );
        assert_eq!(
            config.rules_for(ProposalKind::ParameterChange),
            TallyRules::supermajority(10)
        );
    }
}
