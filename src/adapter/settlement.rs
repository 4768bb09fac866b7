//! Settlement executors that run without a chain.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::domain::{Direction, MarketRef, Outcome, Price};
use crate::error::ExternalError;
use crate::port::{MarketCreation, SettlementExecutor};

/// In-memory settlement layer.
///
/// Hands out `sim-<n>` references and resolves them from the stored
/// strike and direction.
#[derive(Default)]
pub struct SimulatedSettlement {
    next: AtomicU64,
    markets: DashMap<String, (Price, Direction)>,
}

impl SimulatedSettlement {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Markets created so far.
    pub fn created(&self) -> usize {
        self.markets.len()
    }
}

#[async_trait]
impl SettlementExecutor for SimulatedSettlement {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn submit_market_creation(
        &self,
        params: &MarketCreation,
    ) -> Result<MarketRef, ExternalError> {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        let id = format!("sim-{n}");
        self.markets
            .insert(id.clone(), (params.strike, params.direction));
        debug!(market_id = %params.market_id, market_ref = %id, "Simulated market creation");
        Ok(MarketRef::external(id))
    }

    async fn submit_resolution(
        &self,
        market_ref: &MarketRef,
        price: Price,
    ) -> Result<Outcome, ExternalError> {
        let (strike, direction) = self
            .markets
            .get(market_ref.id())
            .map(|entry| *entry.value())
            .ok_or_else(|| ExternalError::Rejected {
                service: "settlement",
                reason: format!("unknown market ref {}", market_ref.id()),
            })?;
        Ok(if direction.resolves_yes(price, strike) {
            Outcome::Yes
        } else {
            Outcome::No
        })
    }
}

/// Settlement layer that is never reachable.
///
/// Every deployment takes the simulated fallback path.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineSettlement;

#[async_trait]
impl SettlementExecutor for OfflineSettlement {
    fn name(&self) -> &'static str {
        "offline"
    }

    async fn submit_market_creation(
        &self,
        _params: &MarketCreation,
    ) -> Result<MarketRef, ExternalError> {
        Err(ExternalError::Unavailable {
            service: "settlement",
            reason: "offline".into(),
        })
    }

    async fn submit_resolution(
        &self,
        _market_ref: &MarketRef,
        _price: Price,
    ) -> Result<Outcome, ExternalError> {
        Err(ExternalError::Unavailable {
            service: "settlement",
            reason: "offline".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MarketId, ProposalId};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn params(direction: Direction) -> MarketCreation {
        MarketCreation {
            market_id: MarketId::new("mkt-1"),
            proposal_id: ProposalId::new("prop-1"),
            question: "Will BTC/USD trade below 60000?".into(),
            asset: "BTC/USD".into(),
            strike: dec!(60000),
            direction,
            expires_at: Utc::now(),
            liquidity: 1_000,
            yes_odds: dec!(0.5),
        }
    }

    #[tokio::test]
    async fn simulated_refs_are_sequential_and_resolvable() {
        let settlement = SimulatedSettlement::new();
        let first = settlement
            .submit_market_creation(&params(Direction::Below))
            .await
            .unwrap();
        let second = settlement
            .submit_market_creation(&params(Direction::Above))
            .await
            .unwrap();
        assert_eq!(first.id(), "sim-1");
        assert_eq!(second.id(), "sim-2");
        assert_eq!(
            settlement.submit_resolution(&first, dec!(59000)).await,
            Ok(Outcome::Yes)
        );
        assert_eq!(
            settlement.submit_resolution(&second, dec!(59000)).await,
            Ok(Outcome::No)
        );
    }

    #[tokio::test]
    async fn unknown_ref_rejected() {
        let settlement = SimulatedSettlement::new();
        let result = settlement
            .submit_resolution(&MarketRef::external("nope"), dec!(1))
            .await;
        assert!(matches!(result, Err(ExternalError::Rejected { .. })));
    }

    #[tokio::test]
    async fn offline_always_unavailable() {
        let result = OfflineSettlement
            .submit_market_creation(&params(Direction::Above))
            .await;
        assert!(matches!(result, Err(ExternalError::Unavailable { .. })));
    }
}
