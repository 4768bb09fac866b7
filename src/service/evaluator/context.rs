//! Inputs shared by every evaluator for one proposal.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;

use crate::domain::{OracleSnapshot, Price, PriceHistory, Proposal};
use crate::service::RiskGuard;

/// Read-only view of the engine at evaluation time.
pub struct EvaluationContext<'a> {
    pub snapshot: &'a OracleSnapshot,
    pub history: &'a PriceHistory,
    pub risk: &'a RiskGuard,
    /// Unresolved markets per asset.
    pub active_by_asset: &'a HashMap<String, usize>,
    pub now: DateTime<Utc>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(
        snapshot: &'a OracleSnapshot,
        history: &'a PriceHistory,
        risk: &'a RiskGuard,
        active_by_asset: &'a HashMap<String, usize>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            snapshot,
            history,
            risk,
            active_by_asset,
            now,
        }
    }

    /// Current usable price of an asset.
    pub fn spot(&self, asset: &str) -> Option<Price> {
        self.snapshot.price(asset)
    }

    /// Age of the latest usable reading for an asset.
    pub fn data_age(&self, asset: &str) -> Option<Duration> {
        self.snapshot
            .get(asset)
            .filter(|p| p.is_usable())
            .map(|p| p.age(self.now))
    }

    /// Relative distance `|strike - spot| / spot`, when a price exists and
    /// the ratio is representable.
    pub fn strike_distance(&self, proposal: &Proposal) -> Option<f64> {
        let spot = self.spot(proposal.asset())?;
        proposal
            .strike()
            .checked_sub(spot)?
            .abs()
            .checked_div(spot)?
            .to_f64()
    }

    /// Unresolved markets referencing `asset`.
    pub fn active_on(&self, asset: &str) -> usize {
        self.active_by_asset.get(asset).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Direction, PricePoint};
    use crate::service::evaluator::{Evaluator, FeasibilityConfig, FeasibilityEvaluator};
    use crate::service::RiskLimits;
    use crate::testkit::domain::proposal;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn snapshot_with(value: i64, decimals: u32, now: DateTime<Utc>) -> OracleSnapshot {
        let mut snap = OracleSnapshot::empty();
        snap.insert("BTC/USD", PricePoint::new(value, decimals, now));
        snap
    }

    #[test]
    fn distance_is_relative_to_spot() {
        let now = Utc::now();
        let snap = snapshot_with(6_725_000, 2, now);
        let history = PriceHistory::default();
        let guard = RiskGuard::new(RiskLimits::default(), now);
        let active = HashMap::new();
        let ctx = EvaluationContext::new(&snap, &history, &guard, &active, now);

        let p = proposal("BTC/USD", dec!(67000), Direction::Below, now);
        let d = ctx.strike_distance(&p).unwrap();
        assert!((d - 250.0 / 67250.0).abs() < 1e-12);
    }

    #[test]
    fn unrepresentable_distance_is_none() {
        let now = Utc::now();
        // spot of 1e-28 against the largest strike overflows the ratio
        let snap = snapshot_with(1, 28, now);
        let history = PriceHistory::default();
        let guard = RiskGuard::new(RiskLimits::default(), now);
        let active = HashMap::new();
        let ctx = EvaluationContext::new(&snap, &history, &guard, &active, now);

        let p = proposal("BTC/USD", Decimal::MAX, Direction::Above, now);
        assert!(ctx.spot("BTC/USD").is_some());
        assert_eq!(ctx.strike_distance(&p), None);

        let a = FeasibilityEvaluator::new(FeasibilityConfig::default()).score(&p, &ctx);
        assert!(a.rationale.contains("no usable price for BTC/USD"));
    }
}
