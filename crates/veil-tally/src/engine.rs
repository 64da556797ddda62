//! Tally engine service
//!
//! Guard-then-mutate: every operation authorizes against the relationship
//! store or the proposal's electorate snapshot, then mutates under one
//! write lock, then appends the accepted transition to the durable ledger.

use crate::proposal::{
    Proposal, ProposalKind, ProposalStatus, TallyConfig, TallyFact, TallyRules, Vote,
    TALLY_FACT_TYPE_ID,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use veil_core::{
    ClockEffects, EntropyEffects, PhysicalTime, PrincipalId, ProposalId, ResourceId, Result,
    TransitionLedger, VeilError,
};
use veil_relational::{RelationKind, RelationshipStore};

/// Aggregated weights for one proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TallyCounts {
    /// Total weight voting for
    pub for_weight: u64,
    /// Total weight voting against
    pub against_weight: u64,
}

impl TallyCounts {
    /// Total cast weight.
    pub fn total(&self) -> u64 {
        self.for_weight.saturating_add(self.against_weight)
    }
}

#[derive(Debug, Default)]
struct EngineState {
    proposals: HashMap<ProposalId, Proposal>,
    votes: HashMap<ProposalId, HashMap<PrincipalId, Vote>>,
}

/// The tally engine.
///
/// Owns proposal and vote records exclusively; reads the relationship store
/// to authorize proposal authors, snapshot electorates, and gate execution.
pub struct TallyEngine {
    clock: Arc<dyn ClockEffects>,
    entropy: Arc<dyn EntropyEffects>,
    ledger: Arc<dyn TransitionLedger>,
    relationships: Arc<RelationshipStore>,
    config: TallyConfig,
    state: RwLock<EngineState>,
}

impl TallyEngine {
    /// Create an engine over the given effect handles and relationship store.
    pub fn new(
        clock: Arc<dyn ClockEffects>,
        entropy: Arc<dyn EntropyEffects>,
        ledger: Arc<dyn TransitionLedger>,
        relationships: Arc<RelationshipStore>,
        config: TallyConfig,
    ) -> Self {
        Self {
            clock,
            entropy,
            ledger,
            relationships,
            config,
            state: RwLock::new(EngineState::default()),
        }
    }

    /// Rebuild proposals and votes from the ledger's committed facts.
    pub async fn replay(&self) -> Result<()> {
        let facts = self.ledger.read(TALLY_FACT_TYPE_ID).await?;
        let mut state = self.state.write();
        *state = EngineState::default();
        for raw in facts {
            match raw.decode::<TallyFact>()? {
                TallyFact::ProposalCreated { proposal } => {
                    state.proposals.insert(proposal.id, proposal);
                }
                TallyFact::VoteCast { vote } => {
                    state
                        .votes
                        .entry(vote.proposal_id)
                        .or_default()
                        .entry(vote.principal.clone())
                        .or_insert(vote);
                }
                TallyFact::Finalized {
                    proposal_id,
                    status,
                    ..
                } => {
                    if let Some(proposal) = state.proposals.get_mut(&proposal_id) {
                        proposal.status = status;
                    }
                }
                TallyFact::Executed { proposal_id, .. } => {
                    if let Some(proposal) = state.proposals.get_mut(&proposal_id) {
                        proposal.status = ProposalStatus::Executed;
                    }
                }
            }
        }
        Ok(())
    }

    /// Create a proposal on `resource`.
    ///
    /// The author must hold `Member` or `Admin` on the resource. The
    /// electorate (every Member and Admin, weight 1) is snapshotted now;
    /// relationship changes after this instant do not affect who may vote.
    pub async fn create_proposal(
        &self,
        author: &PrincipalId,
        resource: &ResourceId,
        kind: ProposalKind,
        content: impl Into<String>,
        deadline_at: PhysicalTime,
    ) -> Result<ProposalId> {
        let rules = self.config.rules_for(kind);
        self.create_proposal_with_rules(author, resource, kind, content, deadline_at, rules)
            .await
    }

    /// Create a proposal with explicit quorum/threshold rules, overriding the
    /// per-kind template.
    pub async fn create_proposal_with_rules(
        &self,
        author: &PrincipalId,
        resource: &ResourceId,
        kind: ProposalKind,
        content: impl Into<String>,
        deadline_at: PhysicalTime,
        rules: TallyRules,
    ) -> Result<ProposalId> {
        let now = self.clock.now().await;
        if now.is_at_or_after(deadline_at) {
            return Err(VeilError::invalid("proposal deadline must be in the future"));
        }
        if !self.is_qualified(author, resource) {
            return Err(VeilError::unauthorized(
                "proposal author must be a member or admin of the resource",
            ));
        }

        let mut id_bytes = [0u8; 16];
        self.entropy.fill_bytes(&mut id_bytes).await;
        let id = ProposalId::from_entropy(id_bytes);

        let proposal = Proposal {
            id,
            resource: resource.clone(),
            kind,
            content: content.into(),
            created_at: now,
            deadline_at,
            snapshot_at: now,
            rules,
            snapshot_weights: self.snapshot_electorate(resource),
            status: ProposalStatus::Active,
        };

        self.state.write().proposals.insert(id, proposal.clone());

        tracing::debug!(%id, %resource, ?kind, electorate = proposal.snapshot_weights.len(), "proposal created");
        self.ledger
            .apply(TallyFact::ProposalCreated { proposal }.to_ledger_fact()?)
            .await?;
        Ok(id)
    }

    /// Cast a vote.
    ///
    /// Rejected with `ProposalNotActive` once the status leaves `Active` or
    /// from the deadline instant onward; `Unauthorized` if the principal was
    /// not in the creation-time snapshot; `AlreadyVoted` on a duplicate —
    /// the first vote is never overwritten.
    pub async fn cast_vote(
        &self,
        proposal_id: ProposalId,
        principal: &PrincipalId,
        support: bool,
    ) -> Result<()> {
        let now = self.clock.now().await;
        let vote = {
            let mut state = self.state.write();
            let proposal = state
                .proposals
                .get(&proposal_id)
                .ok_or_else(|| VeilError::not_found(format!("{proposal_id}")))?;

            if proposal.status != ProposalStatus::Active {
                return Err(VeilError::proposal_not_active(format!(
                    "{proposal_id} is {:?}",
                    proposal.status
                )));
            }
            if now.is_at_or_after(proposal.deadline_at) {
                return Err(VeilError::proposal_not_active(format!(
                    "{proposal_id} deadline has passed"
                )));
            }
            let weight = proposal.snapshot_weight(principal).ok_or_else(|| {
                VeilError::unauthorized("principal was not in the electorate at snapshot time")
            })?;

            let ballots = state.votes.entry(proposal_id).or_default();
            match ballots.entry(principal.clone()) {
                std::collections::hash_map::Entry::Occupied(_) => {
                    return Err(VeilError::already_voted(format!(
                        "{principal} already voted on {proposal_id}"
                    )));
                }
                std::collections::hash_map::Entry::Vacant(entry) => {
                    let vote = Vote {
                        proposal_id,
                        principal: principal.clone(),
                        support,
                        weight,
                        cast_at: now,
                    };
                    entry.insert(vote.clone());
                    vote
                }
            }
        };

        tracing::debug!(%proposal_id, %principal, support, weight = vote.weight, "vote cast");
        self.ledger
            .apply(TallyFact::VoteCast { vote }.to_ledger_fact()?)
            .await
    }

    /// Finalize a proposal at or after its deadline.
    ///
    /// Idempotent: once finalized (or executed), repeated calls return the
    /// stored status without re-evaluating. Fails quorum → `Rejected`;
    /// meets quorum and threshold → `Passed`.
    pub async fn finalize(&self, proposal_id: ProposalId) -> Result<ProposalStatus> {
        let now = self.clock.now().await;
        let (status, newly_finalized) = {
            let mut state = self.state.write();
            let counts = Self::count(&state, proposal_id);
            let proposal = state
                .proposals
                .get_mut(&proposal_id)
                .ok_or_else(|| VeilError::not_found(format!("{proposal_id}")))?;

            match proposal.status {
                ProposalStatus::Active => {
                    if !now.is_at_or_after(proposal.deadline_at) {
                        return Err(VeilError::invalid_state(format!(
                            "{proposal_id} cannot finalize before its deadline"
                        )));
                    }
                    let status = if proposal.rules.passes(counts.for_weight, counts.against_weight)
                    {
                        ProposalStatus::Passed
                    } else {
                        ProposalStatus::Rejected
                    };
                    proposal.status = status;
                    (status, true)
                }
                already => (already, false),
            }
        };

        if newly_finalized {
            tracing::debug!(%proposal_id, ?status, "proposal finalized");
            self.ledger
                .apply(
                    TallyFact::Finalized {
                        proposal_id,
                        status,
                        finalized_at: now,
                    }
                    .to_ledger_fact()?,
                )
                .await?;
        }
        Ok(status)
    }

    /// Execute a passed proposal.
    ///
    /// Only valid from `Passed`; the executor must hold `Admin` on the
    /// governed resource. Returns the proposal record so the caller can
    /// apply its side effect — this call is the single point where that
    /// happens, and the record itself never acts implicitly.
    pub async fn execute(
        &self,
        proposal_id: ProposalId,
        executor: &PrincipalId,
    ) -> Result<Proposal> {
        let now = self.clock.now().await;
        let proposal = {
            let mut state = self.state.write();
            let proposal = state
                .proposals
                .get_mut(&proposal_id)
                .ok_or_else(|| VeilError::not_found(format!("{proposal_id}")))?;

            if proposal.status != ProposalStatus::Passed {
                return Err(VeilError::invalid_state(format!(
                    "{proposal_id} is {:?}, only Passed proposals execute",
                    proposal.status
                )));
            }
            if !self
                .relationships
                .has(executor, &proposal.resource, RelationKind::Admin)
            {
                return Err(VeilError::unauthorized(
                    "executor must be an admin of the governed resource",
                ));
            }

            proposal.status = ProposalStatus::Executed;
            proposal.clone()
        };

        tracing::debug!(%proposal_id, %executor, "proposal executed");
        self.ledger
            .apply(
                TallyFact::Executed {
                    proposal_id,
                    executor: executor.clone(),
                    executed_at: now,
                }
                .to_ledger_fact()?,
            )
            .await?;
        Ok(proposal)
    }

    /// Read one proposal.
    pub fn proposal(&self, proposal_id: ProposalId) -> Option<Proposal> {
        self.state.read().proposals.get(&proposal_id).cloned()
    }

    /// Votes cast on one proposal, in no particular order.
    pub fn votes(&self, proposal_id: ProposalId) -> Vec<Vote> {
        self.state
            .read()
            .votes
            .get(&proposal_id)
            .map(|ballots| ballots.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Current for/against weights for one proposal.
    pub fn tally(&self, proposal_id: ProposalId) -> Result<TallyCounts> {
        let state = self.state.read();
        if !state.proposals.contains_key(&proposal_id) {
            return Err(VeilError::not_found(format!("{proposal_id}")));
        }
        Ok(Self::count(&state, proposal_id))
    }

    fn count(state: &EngineState, proposal_id: ProposalId) -> TallyCounts {
        let mut counts = TallyCounts::default();
        if let Some(ballots) = state.votes.get(&proposal_id) {
            for vote in ballots.values() {
                if vote.support {
                    counts.for_weight += vote.weight;
                } else {
                    counts.against_weight += vote.weight;
                }
            }
        }
        counts
    }

    fn is_qualified(&self, principal: &PrincipalId, resource: &ResourceId) -> bool {
        self.relationships.has(principal, resource, RelationKind::Member)
            || self.relationships.has(principal, resource, RelationKind::Admin)
    }

    /// Every Member and Admin of the resource, weight 1 each. The map is
    /// stored explicitly on the proposal so a weighted source can replace
    /// this without touching the vote path.
    fn snapshot_electorate(&self, resource: &ResourceId) -> BTreeMap<PrincipalId, u64> {
        let mut weights = BTreeMap::new();
        for kind in [RelationKind::Member, RelationKind::Admin] {
            for principal in self.relationships.list_principals(resource, kind) {
                weights.insert(principal, 1);
            }
        }
        weights
    }
}
