//! Risk evaluator.
//!
//! Starts optimistic and subtracts penalties. Two of its signals, creation
//! rate and asset concentration, come from the [`RiskGuard`]; while the guard's
//! circuit breaker is tripped the score is forced to zero.
//!
//! [`RiskGuard`]: crate::service::RiskGuard

use chrono::Duration;
use serde::Deserialize;

use super::{Assessment, EvaluationContext, Evaluator, EvaluatorKind};
use crate::domain::{EvaluatorId, Proposal};

/// Fixed rationale emitted while the circuit breaker is tripped.
pub const CIRCUIT_BREAKER_RATIONALE: &str = "circuit breaker active";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RiskEvaluatorConfig {
    pub baseline: i64,
    /// Penalty per deployment above the safe hourly rate.
    pub rate_penalty_per_excess: i64,
    pub max_rate_penalty: i64,
    pub min_duration_minutes: i64,
    pub max_duration_hours: i64,
    pub duration_penalty: i64,
    /// Relative strike distance beyond which the market is implausible.
    pub far_strike_distance: f64,
    pub far_strike_penalty: i64,
    /// Relative strike distance below which the outcome is near-certain.
    pub trivial_strike_distance: f64,
    pub trivial_strike_penalty: i64,
    pub missing_price_penalty: i64,
    pub min_question_len: usize,
    pub question_penalty: i64,
    pub concentration_penalty: i64,
}

impl Default for RiskEvaluatorConfig {
    fn default() -> Self {
        Self {
            baseline: 85,
            rate_penalty_per_excess: 5,
            max_rate_penalty: 30,
            min_duration_minutes: 5,
            max_duration_hours: 168,
            duration_penalty: 20,
            far_strike_distance: 0.25,
            far_strike_penalty: 20,
            trivial_strike_distance: 0.0002,
            trivial_strike_penalty: 15,
            missing_price_penalty: 10,
            min_question_len: 15,
            question_penalty: 25,
            concentration_penalty: 20,
        }
    }
}

pub struct RiskEvaluator {
    id: EvaluatorId,
    config: RiskEvaluatorConfig,
}

impl RiskEvaluator {
    #[must_use]
    pub fn new(config: RiskEvaluatorConfig) -> Self {
        Self {
            id: EvaluatorId::new(EvaluatorKind::Risk.as_str()),
            config,
        }
    }
}

impl Evaluator for RiskEvaluator {
    fn id(&self) -> &EvaluatorId {
        &self.id
    }

    fn kind(&self) -> EvaluatorKind {
        EvaluatorKind::Risk
    }

    fn score(&self, proposal: &Proposal, ctx: &EvaluationContext<'_>) -> Assessment {
        if ctx.risk.is_tripped() {
            return Assessment::new(0, CIRCUIT_BREAKER_RATIONALE);
        }

        let cfg = &self.config;
        let limits = ctx.risk.limits();
        let mut tally = Assessment::tally(cfg.baseline);

        let rate = ctx.risk.deployments_last_hour(ctx.now);
        if rate > limits.safe_markets_per_hour {
            let excess = i64::from(rate - limits.safe_markets_per_hour);
            let penalty = (excess * cfg.rate_penalty_per_excess).min(cfg.max_rate_penalty);
            tally.adjust(-penalty, format!("{rate} markets in the last hour"));
        }

        let duration = proposal.duration();
        if duration < Duration::minutes(cfg.min_duration_minutes) {
            tally.adjust(-cfg.duration_penalty, "ultra-short duration");
        } else if duration > Duration::hours(cfg.max_duration_hours) {
            tally.adjust(-cfg.duration_penalty, "excessively long duration");
        }

        match ctx.strike_distance(proposal) {
            Some(d) if d > cfg.far_strike_distance => {
                tally.adjust(-cfg.far_strike_penalty, "strike implausibly far from spot");
            }
            Some(d) if d < cfg.trivial_strike_distance => {
                tally.adjust(-cfg.trivial_strike_penalty, "strike too close, outcome trivial");
            }
            Some(_) => {}
            None => tally.adjust(-cfg.missing_price_penalty, "no reference price"),
        }

        if proposal.question().trim().chars().count() < cfg.min_question_len {
            tally.adjust(-cfg.question_penalty, "question malformed or too short");
        }

        let recent = ctx.risk.asset_deployments(proposal.asset(), ctx.now);
        if recent >= limits.max_asset_deployments {
            tally.adjust(
                -cfg.concentration_penalty,
                format!("{recent} recent deployments on {}", proposal.asset()),
            );
        }

        let assessment = tally.finish();
        if assessment.rationale.is_empty() {
            Assessment::new(assessment.score, "no risk flags")
        } else {
            assessment
        }
    }
}
