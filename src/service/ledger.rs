//! Market Ledger: the set of live markets and per-market operations.
//!
//! Markets sit in a concurrent map, each behind its own mutex. Operations on
//! one market are mutually exclusive; different markets never contend.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::domain::{
    Fill, Holding, HolderId, Market, MarketId, MarketKey, MarketRef, MarketSummary, Outcome, Pools,
    Price, Proposal, Side, Units,
};
use crate::error::LedgerError;

/// All markets owned by one engine.
pub struct MarketLedger {
    fee_bps: Units,
    markets: DashMap<MarketId, Arc<Mutex<Market>>>,
    order: Mutex<Vec<MarketId>>,
}

impl MarketLedger {
    /// Create an empty ledger charging `fee_bps` on buys.
    #[must_use]
    pub fn new(fee_bps: Units) -> Self {
        Self {
            fee_bps,
            markets: DashMap::new(),
            order: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn fee_bps(&self) -> Units {
        self.fee_bps
    }

    fn market(&self, id: &MarketId) -> Result<Arc<Mutex<Market>>, LedgerError> {
        self.markets
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| LedgerError::UnknownMarket(id.clone()))
    }

    fn with_market<T>(
        &self,
        id: &MarketId,
        f: impl FnOnce(&mut Market) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let market = self.market(id)?;
        let mut guard = market.lock();
        f(&mut guard)
    }

    /// Instantiate an unseeded market for an approved proposal.
    pub fn create_market(
        &self,
        proposal: &Proposal,
        market_ref: MarketRef,
        now: DateTime<Utc>,
    ) -> Result<MarketSummary, LedgerError> {
        let market = Market::from_proposal(proposal, market_ref, self.fee_bps, now)?;
        let id = market.id().clone();
        let summary = market.summary();

        match self.markets.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(LedgerError::DuplicateMarket(id));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(market)));
            }
        }
        self.order.lock().push(id.clone());
        debug!(market_id = %id, "Market created");
        Ok(summary)
    }

    /// Deposit initial liquidity at the given implied YES odds.
    pub fn seed(&self, id: &MarketId, amount: Units, yes_odds: Price) -> Result<Pools, LedgerError> {
        self.with_market(id, |m| m.seed(amount, yes_odds))
    }

    pub fn buy(
        &self,
        id: &MarketId,
        holder: &HolderId,
        side: Side,
        amount: Units,
        min_shares: Units,
        now: DateTime<Utc>,
    ) -> Result<Fill, LedgerError> {
        self.with_market(id, |m| m.buy(holder, side, amount, min_shares, now))
    }

    pub fn sell(
        &self,
        id: &MarketId,
        holder: &HolderId,
        side: Side,
        shares: Units,
        min_payout: Units,
        now: DateTime<Utc>,
    ) -> Result<Fill, LedgerError> {
        self.with_market(id, |m| m.sell(holder, side, shares, min_payout, now))
    }

    /// Preview a buy; never mutates.
    pub fn quote_buy(&self, id: &MarketId, side: Side, amount: Units) -> Result<Fill, LedgerError> {
        self.with_market(id, |m| m.quote_buy(side, amount))
    }

    /// Preview a sell; never mutates.
    pub fn quote_sell(&self, id: &MarketId, side: Side, shares: Units) -> Result<Fill, LedgerError> {
        self.with_market(id, |m| m.quote_sell(side, shares))
    }

    /// Resolve against a settlement price. Idempotent once resolved.
    pub fn resolve(
        &self,
        id: &MarketId,
        settlement_price: Price,
        now: DateTime<Utc>,
    ) -> Result<Outcome, LedgerError> {
        self.with_market(id, |m| {
            let was_resolved = m.outcome().is_resolved();
            let outcome = m.resolve(settlement_price, now)?;
            if !was_resolved {
                info!(market_id = %id, outcome = %outcome, price = %settlement_price, "Market resolved");
            }
            Ok(outcome)
        })
    }

    /// Force a market to `Invalid` before normal resolution.
    pub fn invalidate(
        &self,
        id: &MarketId,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let reason = reason.into();
        self.with_market(id, |m| m.invalidate(reason.clone(), now))?;
        info!(market_id = %id, reason = %reason, "Market invalidated");
        Ok(())
    }

    /// Pay out and clear a holder's position in a resolved market.
    pub fn redeem(&self, id: &MarketId, holder: &HolderId) -> Result<Units, LedgerError> {
        self.with_market(id, |m| m.redeem(holder))
    }

    /// Implied `(yes, no)` prices.
    pub fn prices(&self, id: &MarketId) -> Result<(Price, Price), LedgerError> {
        self.with_market(id, |m| {
            let pools = m.pools();
            Ok((pools.yes_price(), pools.no_price()))
        })
    }

    pub fn snapshot(&self, id: &MarketId) -> Result<MarketSummary, LedgerError> {
        self.with_market(id, |m| Ok(m.summary()))
    }

    pub fn holding(&self, id: &MarketId, holder: &HolderId) -> Result<Holding, LedgerError> {
        self.with_market(id, |m| Ok(m.holding(holder)))
    }

    fn summaries(&self, keep: impl Fn(&Market) -> bool) -> Vec<MarketSummary> {
        let order = self.order.lock().clone();
        order
            .iter()
            .filter_map(|id| self.market(id).ok())
            .filter_map(|m| {
                let m = m.lock();
                keep(&m).then(|| m.summary())
            })
            .collect()
    }

    /// Every market in creation order.
    pub fn markets(&self) -> Vec<MarketSummary> {
        self.summaries(|_| true)
    }

    /// Markets still accepting trades.
    pub fn active(&self, now: DateTime<Utc>) -> Vec<MarketSummary> {
        self.summaries(|m| m.is_active(now))
    }

    /// Unresolved markets at or past their resolution time.
    pub fn due_for_resolution(&self, now: DateTime<Utc>) -> Vec<MarketSummary> {
        self.summaries(|m| m.is_due(now))
    }

    /// Number of unresolved markets per asset.
    pub fn active_by_asset(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for m in self.summaries(|m| !m.outcome().is_resolved()) {
            *counts.entry(m.asset).or_insert(0) += 1;
        }
        counts
    }

    /// Market keys of every unresolved market.
    pub fn active_keys(&self) -> HashSet<MarketKey> {
        self.summaries(|m| !m.outcome().is_resolved())
            .into_iter()
            .map(|m| MarketKey {
                asset: m.asset,
                strike: m.strike,
                direction: m.direction,
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.markets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

impl Default for MarketLedger {
    fn default() -> Self {
        Self::new(0)
    }
}
