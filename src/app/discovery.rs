//! Candidate discovery from oracle snapshots.
//!
//! Three sources, in priority order:
//!
//! - **Round number**: price within `round_proximity` of a round level.
//! - **Momentum**: price moved at least `momentum_threshold` since the
//!   previous sample; the strike extends the move.
//! - **Variety**: every `variety_every` cycles, one synthetic candidate on a
//!   rotating symbol.
//!
//! Candidates whose asset/strike/direction is already pending or live are
//! dropped, and at most `limit` are returned.

use std::collections::HashSet;

use chrono::Duration;
use rust_decimal::Decimal;

use super::config::DiscoveryConfig;
use crate::domain::{
    Category, Direction, MarketKey, OracleSnapshot, Price, PriceHistory, ProposalDraft,
};

const ROUND_NUMBER_CONFIDENCE: Decimal = Decimal::from_parts(60, 0, 0, false, 2);
const MOMENTUM_CONFIDENCE: Decimal = Decimal::from_parts(55, 0, 0, false, 2);
const VARIETY_CONFIDENCE: Decimal = Decimal::from_parts(40, 0, 0, false, 2);

/// Power of ten that puts `price` in `[10, 100)` units of it.
fn round_step(price: Price) -> Price {
    let hundred = Decimal::from(100);
    let ten = Decimal::TEN;
    let floor = Decimal::new(1, 6);
    let mut step = Decimal::ONE;
    while price / step >= hundred {
        step *= ten;
    }
    while price / step < ten && step > floor {
        step /= ten;
    }
    step
}

/// Round to a tenth of the asset's round step.
fn tidy_strike(price: Price) -> Price {
    let grain = round_step(price) / Decimal::TEN;
    ((price / grain).round() * grain).normalize()
}

fn question(asset: &str, direction: Direction, strike: Price, minutes: i64) -> String {
    format!(
        "Will {asset} trade {} {} within {minutes} minutes?",
        direction.as_word(),
        strike.normalize()
    )
}

pub struct Discovery {
    config: DiscoveryConfig,
}

impl Discovery {
    #[must_use]
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    fn draft(
        &self,
        asset: &str,
        strike: Price,
        direction: Direction,
        category: Category,
    ) -> ProposalDraft {
        let (minutes, confidence) = match category {
            Category::RoundNumber => (self.config.round_number_minutes, ROUND_NUMBER_CONFIDENCE),
            Category::Momentum => (self.config.momentum_minutes, MOMENTUM_CONFIDENCE),
            Category::Variety | Category::Manual => {
                (self.config.variety_minutes, VARIETY_CONFIDENCE)
            }
        };
        ProposalDraft::builder()
            .question(question(asset, direction, strike, minutes))
            .asset(asset)
            .strike(strike)
            .direction(direction)
            .duration(Duration::minutes(minutes))
            .category(category)
            .confidence(confidence)
            .build()
    }

    fn round_number(&self, asset: &str, price: Price) -> Vec<ProposalDraft> {
        let step = round_step(price);
        let below = (price / step).floor() * step;
        let above = below + step;
        [below, above]
            .into_iter()
            .filter_map(|level| {
                let distance = (level - price).abs() / price;
                (distance >= self.config.min_strike_distance
                    && distance <= self.config.round_proximity)
                    .then(|| {
                        let direction = if level > price {
                            Direction::Above
                        } else {
                            Direction::Below
                        };
                        self.draft(asset, level.normalize(), direction, Category::RoundNumber)
                    })
            })
            .collect()
    }

    fn momentum(&self, asset: &str, price: Price, previous: Option<Price>) -> Option<ProposalDraft> {
        let previous = previous.filter(|p| *p > Decimal::ZERO)?;
        let change = (price - previous).checked_div(previous)?;
        if change.abs() < self.config.momentum_threshold {
            return None;
        }
        let (direction, factor) = if change > Decimal::ZERO {
            (Direction::Above, Decimal::ONE + self.config.momentum_offset)
        } else {
            (Direction::Below, Decimal::ONE - self.config.momentum_offset)
        };
        Some(self.draft(asset, tidy_strike(price * factor), direction, Category::Momentum))
    }

    fn variety(&self, snapshot: &OracleSnapshot, cycle: u64) -> Option<ProposalDraft> {
        let every = self.config.variety_every;
        if every == 0 || cycle == 0 || cycle % every != 0 {
            return None;
        }
        let symbols = snapshot.symbols();
        if symbols.is_empty() {
            return None;
        }
        let round = cycle / every;
        let asset = symbols[(round as usize) % symbols.len()];
        let price = snapshot.price(asset)?;
        let (direction, factor) = if round % 2 == 0 {
            (Direction::Above, Decimal::ONE + self.config.variety_offset)
        } else {
            (Direction::Below, Decimal::ONE - self.config.variety_offset)
        };
        Some(self.draft(asset, tidy_strike(price * factor), direction, Category::Variety))
    }

    /// Produce de-duplicated candidates for one cycle.
    ///
    /// `history` must already contain `snapshot` so that `previous` is the
    /// sample before it.
    pub fn discover(
        &self,
        snapshot: &OracleSnapshot,
        history: &PriceHistory,
        cycle: u64,
        exclude: &HashSet<MarketKey>,
        limit: usize,
    ) -> Vec<ProposalDraft> {
        let mut found = Vec::new();
        for asset in snapshot.symbols() {
            if let Some(price) = snapshot.price(asset) {
                found.extend(self.round_number(asset, price));
            }
        }
        for asset in snapshot.symbols() {
            if let Some(price) = snapshot.price(asset) {
                found.extend(self.momentum(asset, price, history.previous(asset)));
            }
        }
        found.extend(self.variety(snapshot, cycle));

        let mut seen = exclude.clone();
        found
            .into_iter()
            .filter(|draft| seen.insert(draft.key()))
            .take(limit)
            .collect()
    }
}
