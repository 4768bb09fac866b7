//! Simulated price feed: a seeded random walk per symbol.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::trace;

use crate::domain::{OracleSnapshot, PricePoint};
use crate::error::ExternalError;
use crate::port::PriceFeed;

/// Decimals of simulated readings.
const DECIMALS: u32 = 2;

fn starting_price(symbol: &str) -> f64 {
    match symbol {
        "BTC/USD" => 67_250.0,
        "ETH/USD" => 3_450.0,
        "SOL/USD" => 150.0,
        _ => 100.0,
    }
}

struct WalkState {
    rng: StdRng,
    prices: HashMap<String, f64>,
}

/// Random-walk feed for running without a real oracle.
///
/// Every call moves each requested symbol by a uniform step of at most
/// `max_step` (relative) and stamps the reading with the current time.
pub struct SimulatedFeed {
    state: Mutex<WalkState>,
    max_step: f64,
}

impl SimulatedFeed {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            state: Mutex::new(WalkState {
                rng: StdRng::seed_from_u64(seed),
                prices: HashMap::new(),
            }),
            max_step: 0.004,
        }
    }

    /// Override the maximum relative move per call.
    #[must_use]
    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = max_step.abs();
        self
    }

    /// Pin a symbol's current price.
    pub fn set_price(&self, symbol: impl Into<String>, price: f64) {
        self.state.lock().prices.insert(symbol.into(), price);
    }
}

#[async_trait]
impl PriceFeed for SimulatedFeed {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn snapshot(&self, symbols: &[String]) -> Result<OracleSnapshot, ExternalError> {
        let now = Utc::now();
        let mut snapshot = OracleSnapshot::empty().with_fetched_at(now);
        let mut state = self.state.lock();
        let WalkState { rng, prices } = &mut *state;

        for symbol in symbols {
            let price = prices
                .entry(symbol.clone())
                .or_insert_with(|| starting_price(symbol));
            let step = if self.max_step > 0.0 {
                rng.gen_range(-self.max_step..=self.max_step)
            } else {
                0.0
            };
            *price = (*price * (1.0 + step)).max(0.01);

            let Some(point) = Decimal::from_f64(*price)
                .map(|d| d.round_dp(DECIMALS))
                .and_then(|d| PricePoint::from_price(d, now))
            else {
                continue;
            };
            trace!(symbol = %symbol, price = %point.price(), "Simulated tick");
            snapshot.insert(symbol.clone(), point);
        }
        Ok(snapshot)
    }
}
