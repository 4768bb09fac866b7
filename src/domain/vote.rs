//! Votes, conviction scores and the consensus rule.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::{EvaluatorId, ProposalId};

/// Conviction score bounded to `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Conviction(u8);

impl Conviction {
    pub const MIN: Conviction = Conviction(0);
    pub const MAX: Conviction = Conviction(100);

    /// Clamp an arbitrary raw score into range. Out-of-range input is not an error.
    #[must_use]
    pub fn clamped(raw: i64) -> Self {
        Self(raw.clamp(0, 100) as u8)
    }

    #[must_use]
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Conviction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One evaluator's recorded vote on one proposal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vote {
    pub proposal_id: ProposalId,
    pub evaluator: EvaluatorId,
    pub score: Conviction,
    pub rationale: String,
    pub cast_at: DateTime<Utc>,
}

/// Final, immutable decision for a proposal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsensusResult {
    pub proposal_id: ProposalId,
    pub vote_count: usize,
    /// Mean score rounded to one decimal place, for reporting only.
    pub mean_score: Decimal,
    pub approved: bool,
    pub finalized_at: DateTime<Utc>,
    pub votes: Vec<Vote>,
}

/// Quorum + threshold rule applied once enough distinct votes exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsensusRule {
    pub quorum: usize,
    pub threshold: Decimal,
}

impl Default for ConsensusRule {
    fn default() -> Self {
        Self {
            quorum: 4,
            threshold: Decimal::from(60),
        }
    }
}

impl ConsensusRule {
    /// Whether `count` distinct votes are enough to decide.
    #[must_use]
    pub fn has_quorum(&self, count: usize) -> bool {
        count >= self.quorum
    }

    /// Unrounded arithmetic mean of the scores, or `None` with no votes.
    #[must_use]
    pub fn mean<'a>(votes: impl IntoIterator<Item = &'a Vote>) -> Option<Decimal> {
        let (sum, count) = votes
            .into_iter()
            .fold((Decimal::ZERO, 0u32), |(sum, n), v| {
                (sum + Decimal::from(v.score.value()), n + 1)
            });
        (count > 0).then(|| sum / Decimal::from(count))
    }

    /// Decide a proposal. Returns `None` while quorum is not reached.
    ///
    /// The threshold comparison uses the unrounded mean; a mean exactly at
    /// the threshold approves.
    #[must_use]
    pub fn decide(
        &self,
        proposal_id: &ProposalId,
        votes: Vec<Vote>,
        now: DateTime<Utc>,
    ) -> Option<ConsensusResult> {
        if !self.has_quorum(votes.len()) {
            return None;
        }
        let mean = Self::mean(&votes)?;
        Some(ConsensusResult {
            proposal_id: proposal_id.clone(),
            vote_count: votes.len(),
            mean_score: mean.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero),
            approved: mean >= self.threshold,
            finalized_at: now,
            votes,
        })
    }
}
