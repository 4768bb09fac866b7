//! Data-confidence evaluator.
//!
//! Scores how much the oracle data behind a proposal can be trusted.

use serde::Deserialize;

use super::{Assessment, EvaluationContext, Evaluator, EvaluatorKind};
use crate::domain::{EvaluatorId, Proposal};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfidenceConfig {
    pub baseline: i64,
    /// Readings older than this are stale.
    pub freshness_secs: i64,
    /// Trailing samples used for the variance check.
    pub variance_window: usize,
    /// Samples needed before variance is trusted.
    pub min_samples: usize,
    /// Coefficient of variation above which prices count as noisy.
    pub volatility_threshold: f64,
    /// Markets shorter than this need fresher data.
    pub short_market_minutes: i64,
    pub short_market_freshness_secs: i64,
    /// Score when the asset has no usable price at all.
    pub missing_data_score: i64,
}

impl Default for DataConfidenceConfig {
    fn default() -> Self {
        Self {
            baseline: 60,
            freshness_secs: 60,
            variance_window: 5,
            min_samples: 3,
            volatility_threshold: 0.01,
            short_market_minutes: 30,
            short_market_freshness_secs: 15,
            missing_data_score: 10,
        }
    }
}

pub struct DataConfidenceEvaluator {
    id: EvaluatorId,
    config: DataConfidenceConfig,
}

impl DataConfidenceEvaluator {
    #[must_use]
    pub fn new(config: DataConfidenceConfig) -> Self {
        Self {
            id: EvaluatorId::new(EvaluatorKind::DataConfidence.as_str()),
            config,
        }
    }
}

impl Evaluator for DataConfidenceEvaluator {
    fn id(&self) -> &EvaluatorId {
        &self.id
    }

    fn kind(&self) -> EvaluatorKind {
        EvaluatorKind::DataConfidence
    }

    fn score(&self, proposal: &Proposal, ctx: &EvaluationContext<'_>) -> Assessment {
        let cfg = &self.config;
        let asset = proposal.asset();

        let Some(age) = ctx.data_age(asset) else {
            let mut tally = Assessment::tally(cfg.missing_data_score);
            tally.adjust(0, format!("no price data for {asset}"));
            return tally.finish();
        };
        let age_secs = age.num_seconds();

        let mut tally = Assessment::tally(cfg.baseline);
        if age_secs <= cfg.freshness_secs {
            tally.adjust(20, format!("fresh data ({age_secs}s)"));
        } else {
            tally.adjust(-15, format!("stale data ({age_secs}s)"));
        }

        let samples = ctx.history.len(asset);
        match ctx.history.relative_volatility(asset, cfg.variance_window) {
            Some(cv) if samples >= cfg.min_samples => {
                if cv > cfg.volatility_threshold {
                    tally.adjust(-20, format!("high short-window variance ({:.2}%)", cv * 100.0));
                } else {
                    tally.adjust(10, "stable prices");
                }
            }
            _ => tally.adjust(-10, format!("insufficient history ({samples} samples)")),
        }

        if proposal.duration().num_minutes() < cfg.short_market_minutes
            && age_secs > cfg.short_market_freshness_secs
        {
            tally.adjust(-15, "data too old for a short market");
        }

        tally.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PricePoint;
    use crate::service::evaluator::test_support::{proposal, Fixture};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn eval() -> DataConfidenceEvaluator {
        DataConfidenceEvaluator::new(DataConfidenceConfig::default())
    }

    #[test]
    fn fresh_stable_data_scores_high() {
        let fx = Fixture::new();
        let p = proposal("BTC/USD", dec!(67500), Duration::hours(1), dec!(0.5));
        let a = eval().score(&p, &fx.ctx());
        assert_eq!(a.score, 90);
    }

    #[test]
    fn thin_history_is_penalised() {
        let fx = Fixture::new();
        let p = proposal("ETH/USD", dec!(3500), Duration::hours(1), dec!(0.5));
        let a = eval().score(&p, &fx.ctx());
        assert_eq!(a.score, 70);
        assert!(a.rationale.contains("insufficient history (1 samples)"));
    }

    #[test]
    fn missing_data_degrades_without_failing() {
        let fx = Fixture::new();
        let p = proposal("SOL/USD", dec!(150), Duration::hours(1), dec!(0.5));
        let a = eval().score(&p, &fx.ctx());
        assert_eq!(a.score, 10);
        assert_eq!(a.rationale, "no price data for SOL/USD");
    }

    #[test]
    fn stale_data_hurts_short_markets_more() {
        let mut fx = Fixture::new();
        fx.snapshot
            .insert("BTC/USD", PricePoint::new(6_725_000, 2, fx.now - Duration::minutes(2)));
        let long = proposal("BTC/USD", dec!(67500), Duration::hours(1), dec!(0.5));
        let short = proposal("BTC/USD", dec!(67500), Duration::minutes(10), dec!(0.5));
        let long_score = eval().score(&long, &fx.ctx()).score;
        let short_score = eval().score(&short, &fx.ctx()).score;
        assert_eq!(long_score, 55);
        assert_eq!(short_score, 40);
    }

    #[test]
    fn noisy_prices_are_penalised() {
        let mut fx = Fixture::new();
        for (i, cents) in [6_000_000, 7_000_000, 6_100_000].into_iter().enumerate() {
            let mut snap = crate::domain::OracleSnapshot::empty();
            snap.insert("BTC/USD", PricePoint::new(cents, 2, fx.now + Duration::seconds(i as i64 + 1)));
            fx.history.record(&snap);
        }
        let p = proposal("BTC/USD", dec!(67500), Duration::hours(1), dec!(0.5));
        let a = eval().score(&p, &fx.ctx());
        assert_eq!(a.score, 60);
        assert!(a.rationale.contains("high short-window variance"));
    }
}
