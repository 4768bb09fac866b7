//! Oracle price snapshots and the bounded per-symbol price history.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Price;

/// One feed reading: `value * 10^-decimals`, published at `timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub value: i64,
    pub decimals: u32,
    pub timestamp: DateTime<Utc>,
}

impl PricePoint {
    #[must_use]
    pub fn new(value: i64, decimals: u32, timestamp: DateTime<Utc>) -> Self {
        Self {
            value,
            decimals,
            timestamp,
        }
    }

    /// Build a point from a decimal price, keeping its scale.
    #[must_use]
    pub fn from_price(price: Price, timestamp: DateTime<Utc>) -> Option<Self> {
        let scale = price.scale();
        let value = i64::try_from(price.mantissa()).ok()?;
        Some(Self::new(value, scale, timestamp))
    }

    /// The scaled decimal price; zero if `decimals` exceeds decimal precision.
    #[must_use]
    pub fn price(&self) -> Price {
        Decimal::try_new(self.value, self.decimals).unwrap_or(Decimal::ZERO)
    }

    /// Whether the reading is a usable positive price.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.price() > Decimal::ZERO
    }

    /// Time elapsed since publication, never negative.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.timestamp).max(Duration::zero())
    }
}

/// A point-in-time read of reference prices per symbol.
///
/// May be partial or empty when the feed failed for some symbols.
#[derive(Debug, Clone, Default)]
pub struct OracleSnapshot {
    points: HashMap<String, PricePoint>,
    fetched_at: Option<DateTime<Utc>>,
}

impl OracleSnapshot {
    /// An empty snapshot, used when a cycle has no data.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(points: HashMap<String, PricePoint>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            points,
            fetched_at: Some(fetched_at),
        }
    }

    /// Insert or replace a symbol's reading.
    pub fn insert(&mut self, symbol: impl Into<String>, point: PricePoint) {
        self.points.insert(symbol.into(), point);
    }

    #[must_use]
    pub fn with_fetched_at(mut self, at: DateTime<Utc>) -> Self {
        self.fetched_at = Some(at);
        self
    }

    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<&PricePoint> {
        self.points.get(symbol)
    }

    #[must_use]
    pub fn price(&self, symbol: &str) -> Option<Price> {
        self.get(symbol).filter(|p| p.is_usable()).map(PricePoint::price)
    }

    #[must_use]
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    /// Symbols present, sorted for deterministic iteration.
    #[must_use]
    pub fn symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = self.points.keys().map(String::as_str).collect();
        symbols.sort_unstable();
        symbols
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Bounded window of recent readings per symbol.
#[derive(Debug, Clone)]
pub struct PriceHistory {
    capacity: usize,
    series: HashMap<String, VecDeque<PricePoint>>,
}

impl PriceHistory {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(2),
            series: HashMap::new(),
        }
    }

    /// Append every reading of a snapshot.
    ///
    /// A reading whose timestamp equals the last stored one is a repeat of
    /// the same publication and is not stored twice.
    pub fn record(&mut self, snapshot: &OracleSnapshot) {
        let capacity = self.capacity;
        for symbol in snapshot.symbols() {
            let Some(point) = snapshot.get(symbol) else {
                continue;
            };
            let series = self
                .series
                .entry(symbol.to_string())
                .or_insert_with(|| VecDeque::with_capacity(capacity));
            if series.back().is_some_and(|last| last.timestamp == point.timestamp) {
                continue;
            }
            if series.len() == capacity {
                series.pop_front();
            }
            series.push_back(*point);
        }
    }

    /// Up to `n` most recent prices for a symbol, oldest first.
    #[must_use]
    pub fn recent(&self, symbol: &str, n: usize) -> Vec<Price> {
        self.series
            .get(symbol)
            .map(|s| {
                let skip = s.len().saturating_sub(n);
                s.iter().skip(skip).map(PricePoint::price).collect()
            })
            .unwrap_or_default()
    }

    /// The reading before the latest one, if any.
    #[must_use]
    pub fn previous(&self, symbol: &str) -> Option<Price> {
        let series = self.series.get(symbol)?;
        let len = series.len();
        (len >= 2).then(|| series[len - 2].price())
    }

    /// Coefficient of variation (stddev / mean) over the last `n` prices.
    ///
    /// Returns `None` with fewer than two samples.
    #[must_use]
    pub fn relative_volatility(&self, symbol: &str, n: usize) -> Option<f64> {
        let samples: Vec<f64> = self
            .recent(symbol, n)
            .iter()
            .filter_map(ToPrimitive::to_f64)
            .collect();
        if samples.len() < 2 {
            return None;
        }
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        if mean <= 0.0 {
            return None;
        }
        let variance =
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples.len() as f64;
        Some(variance.sqrt() / mean)
    }

    #[must_use]
    pub fn len(&self, symbol: &str) -> usize {
        self.series.get(symbol).map_or(0, VecDeque::len)
    }
}

impl Default for PriceHistory {
    fn default() -> Self {
        Self::new(32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot(symbol: &str, value: i64, at: DateTime<Utc>) -> OracleSnapshot {
        let mut s = OracleSnapshot::empty().with_fetched_at(at);
        s.insert(symbol, PricePoint::new(value, 2, at));
        s
    }

    #[test]
    fn price_point_scales_value() {
        let p = PricePoint::new(6_743_215, 2, Utc::now());
        assert_eq!(p.price(), dec!(67432.15));
    }

    #[test]
    fn price_point_from_price_round_trips() {
        let p = PricePoint::from_price(dec!(3150.25), Utc::now()).unwrap();
        assert_eq!(p.decimals, 2);
        assert_eq!(p.price(), dec!(3150.25));
    }

    #[test]
    fn age_is_never_negative() {
        let now = Utc::now();
        let p = PricePoint::new(1, 0, now + Duration::seconds(5));
        assert_eq!(p.age(now), Duration::zero());
    }

    #[test]
    fn history_is_bounded() {
        let mut h = PriceHistory::new(3);
        let t0 = Utc::now();
        for i in 0..5 {
            h.record(&snapshot("BTC", 100 + i, t0 + Duration::seconds(i)));
        }
        assert_eq!(h.len("BTC"), 3);
        assert_eq!(h.recent("BTC", 10), vec![dec!(1.02), dec!(1.03), dec!(1.04)]);
        assert_eq!(h.previous("BTC"), Some(dec!(1.03)));
    }

    #[test]
    fn history_skips_repeated_publication() {
        let mut h = PriceHistory::new(8);
        let t0 = Utc::now();
        h.record(&snapshot("ETH", 100, t0));
        h.record(&snapshot("ETH", 100, t0));
        assert_eq!(h.len("ETH"), 1);
        assert_eq!(h.previous("ETH"), None);
    }

    #[test]
    fn volatility_zero_for_flat_series() {
        let mut h = PriceHistory::new(8);
        let t0 = Utc::now();
        for i in 0..4 {
            h.record(&snapshot("SOL", 1000, t0 + Duration::seconds(i)));
        }
        assert_eq!(h.relative_volatility("SOL", 5), Some(0.0));
    }

    #[test]
    fn volatility_needs_two_samples() {
        let mut h = PriceHistory::new(8);
        h.record(&snapshot("SOL", 1000, Utc::now()));
        assert!(h.relative_volatility("SOL", 5).is_none());
        assert!(h.relative_volatility("missing", 5).is_none());
    }
}
