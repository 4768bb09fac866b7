//! Feasibility evaluator.
//!
//! Asks whether the market can be created and settled sensibly: the asset
//! has a price, the strike is in a plausible range of it, the duration sits
//! in a workable band and the scout was confident. Cumulative deployments
//! pull the score down along a saturating curve.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{Assessment, EvaluationContext, Evaluator, EvaluatorKind};
use crate::domain::{EvaluatorId, Proposal};

/// Configuration for the feasibility evaluator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeasibilityConfig {
    pub baseline: i64,
    /// Strike within this relative distance of spot counts as a valid pairing.
    pub max_strike_distance: f64,
    pub sweet_spot_min_minutes: i64,
    pub sweet_spot_max_minutes: i64,
    /// Below this duration the market is penalised as too short.
    pub short_minutes: i64,
    /// Maximum points awarded for scout confidence of 1.
    pub confidence_weight: i64,
    /// Upper bound of the deployment-density penalty.
    pub max_density_penalty: i64,
    /// Deployments at which half the density penalty applies.
    pub density_half_point: u64,
}

impl Default for FeasibilityConfig {
    fn default() -> Self {
        Self {
            baseline: 50,
            max_strike_distance: 0.5,
            sweet_spot_min_minutes: 30,
            sweet_spot_max_minutes: 240,
            short_minutes: 10,
            confidence_weight: 20,
            max_density_penalty: 20,
            density_half_point: 10,
        }
    }
}

pub struct FeasibilityEvaluator {
    id: EvaluatorId,
    config: FeasibilityConfig,
}

impl FeasibilityEvaluator {
    #[must_use]
    pub fn new(config: FeasibilityConfig) -> Self {
        Self {
            id: EvaluatorId::new(EvaluatorKind::Feasibility.as_str()),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &FeasibilityConfig {
        &self.config
    }

    /// Penalty that grows with `deployments` and saturates at the maximum.
    fn density_penalty(&self, deployments: u64) -> i64 {
        let max = self.config.max_density_penalty.max(0) as u64;
        let half = self.config.density_half_point.max(1);
        (max * deployments / (deployments + half)) as i64
    }
}

impl Evaluator for FeasibilityEvaluator {
    fn id(&self) -> &EvaluatorId {
        &self.id
    }

    fn kind(&self) -> EvaluatorKind {
        EvaluatorKind::Feasibility
    }

    fn score(&self, proposal: &Proposal, ctx: &EvaluationContext<'_>) -> Assessment {
        let cfg = &self.config;
        let mut tally = Assessment::tally(cfg.baseline);

        match ctx.strike_distance(proposal) {
            Some(d) if d <= cfg.max_strike_distance => tally.adjust(15, "valid asset/strike pairing"),
            Some(d) => tally.adjust(-10, format!("strike {:.1}% from spot", d * 100.0)),
            None => tally.adjust(-20, format!("no usable price for {}", proposal.asset())),
        }

        let minutes = proposal.duration().num_minutes();
        if minutes < cfg.short_minutes {
            tally.adjust(-20, format!("duration {minutes}m too short"));
        } else if (cfg.sweet_spot_min_minutes..=cfg.sweet_spot_max_minutes).contains(&minutes) {
            tally.adjust(15, "duration in sweet spot");
        }

        let confidence = (proposal.confidence() * Decimal::from(cfg.confidence_weight))
            .round()
            .to_i64()
            .unwrap_or(0);
        tally.adjust(confidence, format!("scout confidence {}", proposal.confidence()));

        let penalty = self.density_penalty(ctx.risk.total_deployments());
        if penalty > 0 {
            tally.adjust(-penalty, format!("deployment density -{penalty}"));
        }

        tally.finish()
    }
}
