//! Conviction Registry: proposal lifecycle, vote collection and consensus.
//!
//! Each proposal lives behind its own mutex so votes on one proposal are
//! serialized while different proposals never contend. A proposal moves
//! `Pending -> Approved | Rejected` exactly once, when the number of distinct
//! evaluator votes reaches quorum; later votes are ignored.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::domain::error::DomainError;
use crate::domain::{
    ConsensusResult, ConsensusRule, Conviction, EvaluatorId, MarketKey, Proposal, ProposalDraft,
    ProposalId, ProposalStatus, Vote,
};
use crate::error::RegistryError;

/// Default number of finalized proposals kept for history queries.
pub const DEFAULT_RETENTION: usize = 1_000;

/// Result of recording a vote.
#[derive(Debug, Clone, PartialEq)]
pub enum VoteOutcome {
    /// Quorum not yet reached.
    Pending { votes: usize, quorum: usize },
    /// This vote completed the quorum and decided the proposal.
    Finalized(ConsensusResult),
    /// The proposal was already decided; the vote was ignored.
    Ignored(ConsensusResult),
}

impl VoteOutcome {
    /// The consensus result, if the proposal is decided.
    #[must_use]
    pub fn result(&self) -> Option<&ConsensusResult> {
        match self {
            VoteOutcome::Pending { .. } => None,
            VoteOutcome::Finalized(r) | VoteOutcome::Ignored(r) => Some(r),
        }
    }
}

#[derive(Debug)]
struct ProposalRecord {
    proposal: Proposal,
    /// Keyed by evaluator: presence of a key is what marks a vote as cast.
    votes: BTreeMap<EvaluatorId, Vote>,
    result: Option<ConsensusResult>,
}

impl ProposalRecord {
    fn status(&self) -> ProposalStatus {
        match &self.result {
            None => ProposalStatus::Pending,
            Some(r) if r.approved => ProposalStatus::Approved,
            Some(_) => ProposalStatus::Rejected,
        }
    }
}

/// Collects proposals and votes and computes consensus.
pub struct ConvictionRegistry {
    rule: ConsensusRule,
    assets: HashSet<String>,
    retention: usize,
    proposals: DashMap<ProposalId, Arc<Mutex<ProposalRecord>>>,
    order: Mutex<Vec<ProposalId>>,
    history: Mutex<VecDeque<ConsensusResult>>,
    /// Results of proposals evicted by retention, without their votes.
    evicted: DashMap<ProposalId, ConsensusResult>,
}

impl ConvictionRegistry {
    /// Create a registry accepting proposals on the given feed symbols.
    pub fn new(rule: ConsensusRule, assets: impl IntoIterator<Item = String>) -> Self {
        Self {
            rule,
            assets: assets.into_iter().collect(),
            retention: DEFAULT_RETENTION,
            proposals: DashMap::new(),
            order: Mutex::new(Vec::new()),
            history: Mutex::new(VecDeque::new()),
            evicted: DashMap::new(),
        }
    }

    /// Keep at most `retention` finalized proposals.
    #[must_use]
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    #[must_use]
    pub fn rule(&self) -> &ConsensusRule {
        &self.rule
    }

    /// Whether an asset reference resolves to a known feed symbol.
    #[must_use]
    pub fn is_known_asset(&self, asset: &str) -> bool {
        self.assets.contains(asset)
    }

    /// Validate and register a new proposal in `Pending` state.
    pub fn create_proposal(
        &self,
        draft: ProposalDraft,
        now: DateTime<Utc>,
    ) -> Result<Proposal, RegistryError> {
        draft.validate()?;
        if !self.is_known_asset(&draft.asset) {
            return Err(DomainError::UnknownAsset {
                asset: draft.asset.clone(),
            }
            .into());
        }

        let id = ProposalId::generate();
        let proposal = Proposal::from_draft(id.clone(), draft, now);
        let record = ProposalRecord {
            proposal: proposal.clone(),
            votes: BTreeMap::new(),
            result: None,
        };
        self.proposals.insert(id.clone(), Arc::new(Mutex::new(record)));
        self.order.lock().push(id);
        Ok(proposal)
    }

    fn record(&self, id: &ProposalId) -> Result<Arc<Mutex<ProposalRecord>>, RegistryError> {
        self.proposals
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RegistryError::UnknownProposal(id.clone()))
    }

    /// Record an evaluator's vote.
    ///
    /// `raw_score` is clamped into `[0, 100]`. A repeat vote from the same
    /// evaluator before quorum replaces the earlier one.
    pub fn vote(
        &self,
        proposal_id: &ProposalId,
        evaluator: &EvaluatorId,
        raw_score: i64,
        rationale: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<VoteOutcome, RegistryError> {
        if let Some(result) = self.evicted.get(proposal_id) {
            debug!(proposal_id = %proposal_id, evaluator = %evaluator, "Vote on evicted proposal ignored");
            return Ok(VoteOutcome::Ignored(result.value().clone()));
        }
        let record = self.record(proposal_id)?;
        let mut record = record.lock();

        if let Some(result) = &record.result {
            debug!(proposal_id = %proposal_id, evaluator = %evaluator, "Vote on finalized proposal ignored");
            return Ok(VoteOutcome::Ignored(result.clone()));
        }

        let vote = Vote {
            proposal_id: proposal_id.clone(),
            evaluator: evaluator.clone(),
            score: Conviction::clamped(raw_score),
            rationale: rationale.into(),
            cast_at: now,
        };
        record.votes.insert(evaluator.clone(), vote);

        let count = record.votes.len();
        let votes: Vec<Vote> = record.votes.values().cloned().collect();
        match self.rule.decide(proposal_id, votes, now) {
            None => Ok(VoteOutcome::Pending {
                votes: count,
                quorum: self.rule.quorum,
            }),
            Some(result) => {
                record.result = Some(result.clone());
                drop(record);
                self.archive(result.clone());
                Ok(VoteOutcome::Finalized(result))
            }
        }
    }

    fn archive(&self, result: ConsensusResult) {
        let evicted = {
            let mut history = self.history.lock();
            history.push_back(result);
            let mut evicted = Vec::new();
            while history.len() > self.retention {
                if let Some(old) = history.pop_front() {
                    evicted.push(old.proposal_id);
                }
            }
            evicted
        };
        if evicted.is_empty() {
            return;
        }
        for id in &evicted {
            let Some(record) = self.proposals.get(id).map(|e| Arc::clone(e.value())) else {
                continue;
            };
            let result = record.lock().result.clone();
            if let Some(mut result) = result {
                result.votes.clear();
                self.evicted.insert(id.clone(), result);
            }
            self.proposals.remove(id);
        }
        let evicted: HashSet<ProposalId> = evicted.into_iter().collect();
        self.order.lock().retain(|id| !evicted.contains(id));
    }

    /// Look up a proposal.
    pub fn get(&self, id: &ProposalId) -> Option<Proposal> {
        self.record(id).ok().map(|r| r.lock().proposal.clone())
    }

    pub fn status(&self, id: &ProposalId) -> Option<ProposalStatus> {
        if let Some(result) = self.evicted.get(id) {
            return Some(if result.approved {
                ProposalStatus::Approved
            } else {
                ProposalStatus::Rejected
            });
        }
        self.record(id).ok().map(|r| r.lock().status())
    }

    /// The consensus result, once decided. Evicted proposals keep the
    /// result without its votes.
    pub fn result(&self, id: &ProposalId) -> Option<ConsensusResult> {
        if let Some(result) = self.evicted.get(id) {
            return Some(result.value().clone());
        }
        self.record(id).ok().and_then(|r| r.lock().result.clone())
    }

    /// Votes recorded so far, ordered by evaluator id.
    pub fn votes(&self, id: &ProposalId) -> Vec<Vote> {
        self.record(id)
            .map(|r| r.lock().votes.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Pending proposals in creation order.
    pub fn pending(&self) -> Vec<Proposal> {
        let order = self.order.lock().clone();
        order
            .iter()
            .filter_map(|id| self.record(id).ok())
            .filter_map(|r| {
                let r = r.lock();
                (r.status() == ProposalStatus::Pending).then(|| r.proposal.clone())
            })
            .collect()
    }

    /// Finalized results in the order they were decided.
    pub fn history(&self) -> Vec<ConsensusResult> {
        self.history.lock().iter().cloned().collect()
    }

    /// Market keys of every pending proposal.
    pub fn open_keys(&self) -> HashSet<MarketKey> {
        self.pending().iter().map(Proposal::key).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }
}
