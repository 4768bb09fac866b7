//! Liquidity-viability evaluator.
//!
//! Markets attract trading when the strike is close to the current price and
//! the duration leaves room to earn fees. Too many open markets on the same
//! asset split the flow.

use serde::Deserialize;

use super::{Assessment, EvaluationContext, Evaluator, EvaluatorKind};
use crate::domain::{EvaluatorId, Proposal};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LiquidityConfig {
    pub baseline: i64,
    /// Points for a strike exactly at spot; falls linearly to zero at
    /// `proximity_range`.
    pub max_proximity_reward: i64,
    pub proximity_range: f64,
    pub fee_sweet_spot_min_minutes: i64,
    pub fee_sweet_spot_max_minutes: i64,
    pub sweet_spot_reward: i64,
    /// Penalty per unresolved market already on the asset.
    pub per_market_penalty: i64,
    /// Open markets on one asset at which the flat penalty applies instead.
    pub concentration_limit: usize,
    pub concentration_penalty: i64,
    pub missing_data_score: i64,
}

impl Default for LiquidityConfig {
    fn default() -> Self {
        Self {
            baseline: 40,
            max_proximity_reward: 30,
            proximity_range: 0.05,
            fee_sweet_spot_min_minutes: 60,
            fee_sweet_spot_max_minutes: 360,
            sweet_spot_reward: 20,
            per_market_penalty: 5,
            concentration_limit: 3,
            concentration_penalty: 25,
            missing_data_score: 15,
        }
    }
}

pub struct LiquidityEvaluator {
    id: EvaluatorId,
    config: LiquidityConfig,
}

impl LiquidityEvaluator {
    #[must_use]
    pub fn new(config: LiquidityConfig) -> Self {
        Self {
            id: EvaluatorId::new(EvaluatorKind::LiquidityViability.as_str()),
            config,
        }
    }

    fn proximity_reward(&self, distance: f64) -> i64 {
        let range = self.config.proximity_range;
        if range <= 0.0 || distance >= range {
            return 0;
        }
        (self.config.max_proximity_reward as f64 * (1.0 - distance / range)) as i64
    }
}

impl Evaluator for LiquidityEvaluator {
    fn id(&self) -> &EvaluatorId {
        &self.id
    }

    fn kind(&self) -> EvaluatorKind {
        EvaluatorKind::LiquidityViability
    }

    fn score(&self, proposal: &Proposal, ctx: &EvaluationContext<'_>) -> Assessment {
        let cfg = &self.config;

        let Some(distance) = ctx.strike_distance(proposal) else {
            let mut tally = Assessment::tally(cfg.missing_data_score);
            tally.adjust(0, "no usable price; cannot assess strike distance");
            return tally.finish();
        };

        let mut tally = Assessment::tally(cfg.baseline);
        let reward = self.proximity_reward(distance);
        tally.adjust(reward, format!("strike {:.2}% from spot", distance * 100.0));

        let minutes = proposal.duration().num_minutes();
        if (cfg.fee_sweet_spot_min_minutes..=cfg.fee_sweet_spot_max_minutes).contains(&minutes) {
            tally.adjust(cfg.sweet_spot_reward, "duration in fee-capture window");
        }

        let open = ctx.active_on(proposal.asset());
        if open >= cfg.concentration_limit {
            tally.adjust(
                -cfg.concentration_penalty,
                format!("{open} markets already open on {}", proposal.asset()),
            );
        } else if open > 0 {
            tally.adjust(
                -(cfg.per_market_penalty * open as i64),
                format!("{open} open on asset"),
            );
        }

        tally.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::evaluator::test_support::{proposal, Fixture};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn eval() -> LiquidityEvaluator {
        LiquidityEvaluator::new(LiquidityConfig::default())
    }

    #[test]
    fn near_strike_in_window_scores_high() {
        let fx = Fixture::new();
        let p = proposal("BTC/USD", dec!(67500), Duration::hours(1), dec!(0.5));
        assert_eq!(eval().score(&p, &fx.ctx()).score, 87);
    }

    #[test]
    fn closer_strike_earns_more() {
        let e = eval();
        assert!(e.proximity_reward(0.001) > e.proximity_reward(0.01));
        assert_eq!(e.proximity_reward(0.0), 30);
        assert_eq!(e.proximity_reward(0.2), 0);
    }

    #[test]
    fn concentration_penalises() {
        let mut fx = Fixture::new();
        let p = proposal("BTC/USD", dec!(67500), Duration::hours(1), dec!(0.5));
        fx.active.insert("BTC/USD".into(), 2);
        assert_eq!(eval().score(&p, &fx.ctx()).score, 77);
        fx.active.insert("BTC/USD".into(), 3);
        assert_eq!(eval().score(&p, &fx.ctx()).score, 62);
    }

    #[test]
    fn missing_price_is_a_strong_negative() {
        let fx = Fixture::new();
        let p = proposal("SOL/USD", dec!(150), Duration::hours(1), dec!(0.5));
        assert_eq!(eval().score(&p, &fx.ctx()).score, 15);
    }
}
