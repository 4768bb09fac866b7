//! Evaluator set: independent scorers that vote on proposals.
//!
//! Each evaluator implements [`Evaluator`], producing a bounded score and a
//! rationale from a proposal and an [`EvaluationContext`]. Evaluators never
//! fail: missing inputs lower the score instead.
//!
//! - **Feasibility**: asset/strike pairing, duration band, scout confidence,
//!   deployment density.
//! - **DataConfidence**: feed presence, freshness, short-window variance.
//! - **LiquidityViability**: strike proximity, fee-capture duration,
//!   per-asset concentration.
//! - **Risk**: creation rate, duration extremes, strike plausibility,
//!   question quality, asset concentration. Forced to 0 while the circuit
//!   breaker is tripped.
//!
//! The [`EvaluatorRegistry`] holds the enabled evaluators and runs them in
//! registration order.

mod context;
pub mod data_confidence;
pub mod feasibility;
pub mod liquidity;
pub mod risk;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use context::EvaluationContext;
pub use data_confidence::{DataConfidenceConfig, DataConfidenceEvaluator};
pub use feasibility::{FeasibilityConfig, FeasibilityEvaluator};
pub use liquidity::{LiquidityConfig, LiquidityEvaluator};
pub use risk::{RiskEvaluator, RiskEvaluatorConfig, CIRCUIT_BREAKER_RATIONALE};

use crate::domain::{EvaluatorId, Proposal};

/// Closed set of evaluator archetypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorKind {
    Feasibility,
    DataConfidence,
    LiquidityViability,
    Risk,
}

impl EvaluatorKind {
    pub const ALL: [EvaluatorKind; 4] = [
        EvaluatorKind::Feasibility,
        EvaluatorKind::DataConfidence,
        EvaluatorKind::LiquidityViability,
        EvaluatorKind::Risk,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluatorKind::Feasibility => "feasibility",
            EvaluatorKind::DataConfidence => "data_confidence",
            EvaluatorKind::LiquidityViability => "liquidity_viability",
            EvaluatorKind::Risk => "risk",
        }
    }
}

impl fmt::Display for EvaluatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One evaluator's verdict before clamping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    pub score: i64,
    pub rationale: String,
}

impl Assessment {
    pub fn new(score: i64, rationale: impl Into<String>) -> Self {
        Self {
            score,
            rationale: rationale.into(),
        }
    }

    /// Start from a baseline and accumulate adjustments with reasons.
    pub(crate) fn tally(baseline: i64) -> Tally {
        Tally {
            score: baseline,
            reasons: Vec::new(),
        }
    }
}

/// Running score plus the reasons that moved it.
#[derive(Debug)]
pub(crate) struct Tally {
    score: i64,
    reasons: Vec<String>,
}

impl Tally {
    pub(crate) fn adjust(&mut self, delta: i64, reason: impl Into<String>) {
        self.score += delta;
        self.reasons.push(reason.into());
    }

    pub(crate) fn finish(self) -> Assessment {
        Assessment {
            score: self.score.clamp(0, 100),
            rationale: self.reasons.join("; "),
        }
    }
}

/// A scorer that votes on proposals.
pub trait Evaluator: Send + Sync {
    /// Voter identity used in the registry.
    fn id(&self) -> &EvaluatorId;

    fn kind(&self) -> EvaluatorKind;

    /// Score a proposal. Must not panic or block.
    fn score(&self, proposal: &Proposal, ctx: &EvaluationContext<'_>) -> Assessment;
}

/// Evaluator selection and tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EvaluatorsConfig {
    /// Enabled evaluators, in voting order.
    pub enabled: Vec<EvaluatorKind>,
    pub feasibility: FeasibilityConfig,
    pub data_confidence: DataConfidenceConfig,
    pub liquidity_viability: LiquidityConfig,
    pub risk: RiskEvaluatorConfig,
}

impl Default for EvaluatorsConfig {
    fn default() -> Self {
        Self {
            enabled: EvaluatorKind::ALL.to_vec(),
            feasibility: FeasibilityConfig::default(),
            data_confidence: DataConfidenceConfig::default(),
            liquidity_viability: LiquidityConfig::default(),
            risk: RiskEvaluatorConfig::default(),
        }
    }
}

/// Registry of enabled evaluators.
#[derive(Default)]
pub struct EvaluatorRegistry {
    evaluators: Vec<Box<dyn Evaluator>>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry described by configuration.
    ///
    /// Duplicate kinds in `enabled` are registered once.
    pub fn from_config(config: &EvaluatorsConfig) -> Self {
        let mut registry = Self::new();
        let mut seen = Vec::new();
        for kind in &config.enabled {
            if seen.contains(kind) {
                continue;
            }
            seen.push(*kind);
            let evaluator: Box<dyn Evaluator> = match kind {
                EvaluatorKind::Feasibility => {
                    Box::new(FeasibilityEvaluator::new(config.feasibility.clone()))
                }
                EvaluatorKind::DataConfidence => {
                    Box::new(DataConfidenceEvaluator::new(config.data_confidence.clone()))
                }
                EvaluatorKind::LiquidityViability => {
                    Box::new(LiquidityEvaluator::new(config.liquidity_viability.clone()))
                }
                EvaluatorKind::Risk => Box::new(RiskEvaluator::new(config.risk.clone())),
            };
            registry.register(evaluator);
        }
        registry
    }

    /// Register an evaluator. Evaluators vote in registration order.
    pub fn register(&mut self, evaluator: Box<dyn Evaluator>) {
        self.evaluators.push(evaluator);
    }

    pub fn evaluators(&self) -> &[Box<dyn Evaluator>] {
        &self.evaluators
    }

    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }

    /// Score a proposal with every evaluator.
    pub fn evaluate_all(
        &self,
        proposal: &Proposal,
        ctx: &EvaluationContext<'_>,
    ) -> Vec<(EvaluatorId, Assessment)> {
        self.evaluators
            .iter()
            .map(|e| {
                let assessment = e.score(proposal, ctx);
                debug!(
                    proposal_id = %proposal.id(),
                    evaluator = %e.id(),
                    score = assessment.score,
                    "Evaluated"
                );
                (e.id().clone(), assessment)
            })
            .collect()
    }
}
