//! Settlement layer port: where markets are created and resolved outside
//! this process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Direction, MarketId, MarketRef, Outcome, Price, ProposalId, Units};
use crate::error::ExternalError;

/// Parameters for creating a market on the settlement layer.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketCreation {
    pub market_id: MarketId,
    pub proposal_id: ProposalId,
    pub question: String,
    pub asset: String,
    pub strike: Price,
    pub direction: Direction,
    pub expires_at: DateTime<Utc>,
    pub liquidity: Units,
    pub yes_odds: Price,
}

/// Submits market creation and resolution.
///
/// Calls are asynchronous and may fail for network or gas-style reasons.
/// The scheduler falls back to a simulated reference on creation failure
/// and treats resolution submission as best-effort.
#[async_trait]
pub trait SettlementExecutor: Send + Sync {
    /// Executor name for logging.
    fn name(&self) -> &'static str;

    async fn submit_market_creation(
        &self,
        params: &MarketCreation,
    ) -> Result<MarketRef, ExternalError>;

    async fn submit_resolution(
        &self,
        market_ref: &MarketRef,
        price: Price,
    ) -> Result<Outcome, ExternalError>;
}
