//! A live binary market: pools, positions and the resolution state machine.
//!
//! ```text
//!   Unresolved ──resolve(price)──▶ Yes | No
//!        │
//!        └──────invalidate()────▶ Invalid
//! ```
//!
//! All three end states are terminal. Every mutating method validates and
//! prices the whole operation before touching any field, so a rejected call
//! leaves the market exactly as it was.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::amm::{Pools, Side};
use super::{Direction, HolderId, MarketId, Price, Proposal, ProposalId, Units};
use crate::error::LedgerError;

/// Resolution state of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Unresolved,
    Yes,
    No,
    Invalid,
}

impl Outcome {
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Outcome::Unresolved)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Unresolved => "unresolved",
            Outcome::Yes => "yes",
            Outcome::No => "no",
            Outcome::Invalid => "invalid",
        };
        f.write_str(s)
    }
}

/// Settlement-layer reference for a deployed market.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketRef {
    id: String,
    simulated: bool,
}

impl MarketRef {
    /// Reference returned by a real settlement executor.
    pub fn external(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            simulated: false,
        }
    }

    /// Local stand-in used when settlement is unavailable.
    pub fn simulated(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            simulated: true,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn is_simulated(&self) -> bool {
        self.simulated
    }
}

impl fmt::Display for MarketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.simulated {
            write!(f, "{} (simulated)", self.id)
        } else {
            write!(f, "{}", self.id)
        }
    }
}

/// A holder's share balances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub yes: Units,
    pub no: Units,
}

impl Holding {
    #[must_use]
    pub fn new(yes: Units, no: Units) -> Self {
        Self { yes, no }
    }

    #[must_use]
    pub fn get(&self, side: Side) -> Units {
        match side {
            Side::Yes => self.yes,
            Side::No => self.no,
        }
    }

    fn get_mut(&mut self, side: Side) -> &mut Units {
        match side {
            Side::Yes => &mut self.yes,
            Side::No => &mut self.no,
        }
    }

    #[must_use]
    pub fn total(&self) -> Units {
        self.yes.saturating_add(self.no)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.yes == 0 && self.no == 0
    }
}

/// A completed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fill {
    pub side: Side,
    /// Collateral paid in (buy) or out (sell).
    pub amount: Units,
    pub shares: Units,
    pub fee: Units,
    pub pools_after: Pools,
}

/// Point-in-time view of a market for queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSummary {
    pub id: MarketId,
    pub proposal_id: ProposalId,
    pub question: String,
    pub asset: String,
    pub strike: Price,
    pub direction: Direction,
    pub market_ref: MarketRef,
    pub pools: Pools,
    pub yes_price: Price,
    pub balance: Units,
    pub fees: Units,
    pub holders: usize,
    pub outcome: Outcome,
    pub expires_at: DateTime<Utc>,
}

/// One binary market.
#[derive(Debug, Clone)]
pub struct Market {
    id: MarketId,
    proposal_id: ProposalId,
    question: String,
    asset: String,
    strike: Price,
    direction: Direction,
    market_ref: MarketRef,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    fee_bps: Units,
    pools: Pools,
    balance: Units,
    fees: Units,
    holdings: HashMap<HolderId, Holding>,
    outstanding: Units,
    outcome: Outcome,
    settlement_price: Option<Price>,
    resolved_at: Option<DateTime<Utc>>,
    invalid_reason: Option<String>,
}

impl Market {
    /// Create an unseeded market from an approved proposal.
    #[must_use]
    pub fn from_proposal(
        proposal: &Proposal,
        market_ref: MarketRef,
        fee_bps: Units,
        now: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        let id = MarketId::for_proposal(proposal.id());
        let expires_at = now
            .checked_add_signed(proposal.duration())
            .ok_or_else(|| LedgerError::ExpiryOutOfRange(id.clone()))?;
        Ok(Self {
            id,
            proposal_id: proposal.id().clone(),
            question: proposal.question().to_string(),
            asset: proposal.asset().to_string(),
            strike: proposal.strike(),
            direction: proposal.direction(),
            market_ref,
            created_at: now,
            expires_at,
            fee_bps,
            pools: Pools::default(),
            balance: 0,
            fees: 0,
            holdings: HashMap::new(),
            outstanding: 0,
            outcome: Outcome::Unresolved,
            settlement_price: None,
            resolved_at: None,
            invalid_reason: None,
        })
    }

    #[must_use]
    pub fn id(&self) -> &MarketId {
        &self.id
    }

    #[must_use]
    pub fn proposal_id(&self) -> &ProposalId {
        &self.proposal_id
    }

    #[must_use]
    pub fn asset(&self) -> &str {
        &self.asset
    }

    #[must_use]
    pub fn strike(&self) -> Price {
        self.strike
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn market_ref(&self) -> &MarketRef {
        &self.market_ref
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    #[must_use]
    pub fn pools(&self) -> Pools {
        self.pools
    }

    /// Collateral currently held by the market.
    #[must_use]
    pub fn balance(&self) -> Units {
        self.balance
    }

    #[must_use]
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    #[must_use]
    pub fn settlement_price(&self) -> Option<Price> {
        self.settlement_price
    }

    #[must_use]
    pub fn invalid_reason(&self) -> Option<&str> {
        self.invalid_reason.as_deref()
    }

    #[must_use]
    pub fn holding(&self, holder: &HolderId) -> Holding {
        self.holdings.get(holder).copied().unwrap_or_default()
    }

    /// Sum of every holder's YES and NO shares.
    #[must_use]
    pub fn outstanding_shares(&self) -> Units {
        self.outstanding
    }

    /// Accepting trades: unresolved and before expiry.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.outcome.is_resolved() && now < self.expires_at
    }

    /// Unresolved and at or past its resolution time.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.outcome.is_resolved() && now >= self.expires_at
    }

    #[must_use]
    pub fn summary(&self) -> MarketSummary {
        MarketSummary {
            id: self.id.clone(),
            proposal_id: self.proposal_id.clone(),
            question: self.question.clone(),
            asset: self.asset.clone(),
            strike: self.strike,
            direction: self.direction,
            market_ref: self.market_ref.clone(),
            pools: self.pools,
            yes_price: self.pools.yes_price(),
            balance: self.balance,
            fees: self.fees,
            holders: self.holdings.len(),
            outcome: self.outcome,
            expires_at: self.expires_at,
        }
    }

    fn ensure_active(&self, now: DateTime<Utc>) -> Result<(), LedgerError> {
        if self.is_active(now) {
            Ok(())
        } else {
            Err(LedgerError::MarketInactive(self.id.clone()))
        }
    }

    /// Deposit initial liquidity with the given implied YES odds.
    ///
    /// Allowed once, before any trade.
    pub fn seed(&mut self, liquidity: Units, yes_odds: Price) -> Result<Pools, LedgerError> {
        if self.outcome.is_resolved() {
            return Err(LedgerError::MarketInactive(self.id.clone()));
        }
        if !self.pools.is_empty() {
            return Err(LedgerError::AlreadySeeded(self.id.clone()));
        }
        let pools = Pools::seeded(liquidity, yes_odds)?;
        let balance = self
            .balance
            .checked_add(liquidity)
            .ok_or(LedgerError::Overflow)?;

        self.pools = pools;
        self.balance = balance;
        Ok(pools)
    }

    /// Preview a buy without changing state.
    pub fn quote_buy(&self, side: Side, amount: Units) -> Result<Fill, LedgerError> {
        let quote = self.pools.quote_buy(side, amount, self.fee_bps)?;
        Ok(Fill {
            side,
            amount,
            shares: quote.shares,
            fee: quote.fee,
            pools_after: quote.pools_after,
        })
    }

    /// Preview a sell without changing state.
    pub fn quote_sell(&self, side: Side, shares: Units) -> Result<Fill, LedgerError> {
        let quote = self.pools.quote_sell(side, shares)?;
        if quote.payout > self.balance {
            return Err(LedgerError::InsufficientPool);
        }
        Ok(Fill {
            side,
            amount: quote.payout,
            shares,
            fee: 0,
            pools_after: quote.pools_after,
        })
    }

    /// Spend `amount` collateral on `side` shares.
    pub fn buy(
        &mut self,
        holder: &HolderId,
        side: Side,
        amount: Units,
        min_shares: Units,
        now: DateTime<Utc>,
    ) -> Result<Fill, LedgerError> {
        self.ensure_active(now)?;
        let fill = self.quote_buy(side, amount)?;
        if fill.shares < min_shares {
            return Err(LedgerError::SlippageExceeded {
                actual: fill.shares,
                minimum: min_shares,
            });
        }
        let balance = self.balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        let outstanding = self
            .outstanding
            .checked_add(fill.shares)
            .ok_or(LedgerError::Overflow)?;
        let mut holding = self.holding(holder);
        let slot = holding.get_mut(side);
        *slot = slot.checked_add(fill.shares).ok_or(LedgerError::Overflow)?;

        self.pools = fill.pools_after;
        self.balance = balance;
        self.fees = self.fees.saturating_add(fill.fee);
        self.outstanding = outstanding;
        self.holdings.insert(holder.clone(), holding);
        Ok(fill)
    }

    /// Sell `shares` of `side` back to the pool.
    pub fn sell(
        &mut self,
        holder: &HolderId,
        side: Side,
        shares: Units,
        min_payout: Units,
        now: DateTime<Utc>,
    ) -> Result<Fill, LedgerError> {
        self.ensure_active(now)?;
        if shares == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let mut holding = self.holding(holder);
        let available = holding.get(side);
        if available < shares {
            return Err(LedgerError::InsufficientShares {
                holder: holder.clone(),
                available,
                requested: shares,
            });
        }
        let fill = self.quote_sell(side, shares)?;
        if fill.amount < min_payout {
            return Err(LedgerError::SlippageExceeded {
                actual: fill.amount,
                minimum: min_payout,
            });
        }
        *holding.get_mut(side) = available - shares;

        self.pools = fill.pools_after;
        self.balance -= fill.amount;
        self.outstanding -= shares;
        if holding.is_empty() {
            self.holdings.remove(holder);
        } else {
            self.holdings.insert(holder.clone(), holding);
        }
        Ok(fill)
    }

    /// Resolve against a settlement price once past the resolution time.
    ///
    /// Resolving an already-resolved market is a no-op returning the
    /// existing outcome.
    pub fn resolve(&mut self, price: Price, now: DateTime<Utc>) -> Result<Outcome, LedgerError> {
        if self.outcome.is_resolved() {
            return Ok(self.outcome);
        }
        if now < self.expires_at {
            return Err(LedgerError::NotExpired(self.id.clone()));
        }
        self.outcome = if self.direction.resolves_yes(price, self.strike) {
            Outcome::Yes
        } else {
            Outcome::No
        };
        self.settlement_price = Some(price);
        self.resolved_at = Some(now);
        Ok(self.outcome)
    }

    /// Administrative override to `Invalid`, only before normal resolution.
    pub fn invalidate(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> Result<(), LedgerError> {
        if self.outcome.is_resolved() {
            return Err(LedgerError::AlreadyResolved(self.id.clone()));
        }
        self.outcome = Outcome::Invalid;
        self.invalid_reason = Some(reason.into());
        self.resolved_at = Some(now);
        Ok(())
    }

    /// Convert a holder's position to collateral and clear it.
    ///
    /// YES/NO outcomes pay the winning shares 1:1; `Invalid` refunds the
    /// holder's share of the remaining balance pro rata to outstanding
    /// shares. Payouts are capped at the remaining balance.
    pub fn redeem(&mut self, holder: &HolderId) -> Result<Units, LedgerError> {
        let holding = self.holding(holder);
        let owed = match self.outcome {
            Outcome::Unresolved => return Err(LedgerError::NotResolved(self.id.clone())),
            Outcome::Yes => holding.yes,
            Outcome::No => holding.no,
            Outcome::Invalid => {
                if self.outstanding == 0 {
                    0
                } else {
                    holding
                        .total()
                        .checked_mul(self.balance)
                        .ok_or(LedgerError::Overflow)?
                        / self.outstanding
                }
            }
        };
        let payout = owed.min(self.balance);
        if payout == 0 {
            return Err(LedgerError::NothingToRedeem(holder.clone()));
        }

        self.balance -= payout;
        self.outstanding = self.outstanding.saturating_sub(holding.total());
        self.holdings.remove(holder);
        Ok(payout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProposalDraft, ProposalId};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn market(now: DateTime<Utc>) -> Market {
        let draft = ProposalDraft::builder()
            .question("Will BTC/USD trade above 70000?")
            .asset("BTC/USD")
            .strike(dec!(70000))
            .direction(Direction::Above)
            .duration(Duration::hours(1))
            .build();
        let proposal = Proposal::from_draft(ProposalId::new("prop-1"), draft, now);
        Market::from_proposal(&proposal, MarketRef::simulated("sim-1"), 0, now).unwrap()
    }

    fn seeded(now: DateTime<Utc>) -> Market {
        let mut m = market(now);
        m.seed(1_000_000, dec!(0.5)).unwrap();
        m
    }

    fn holder(name: &str) -> HolderId {
        HolderId::new(name)
    }

    #[test]
    fn seed_sets_pools_and_balance() {
        let now = Utc::now();
        let m = seeded(now);
        assert_eq!(m.pools(), Pools::new(1_000_000, 1_000_000));
        assert_eq!(m.balance(), 1_000_000);
        assert_eq!(m.id().as_str(), "mkt-1");
    }

    #[test]
    fn seed_only_once() {
        let now = Utc::now();
        let mut m = seeded(now);
        assert_eq!(
            m.seed(10, dec!(0.5)),
            Err(LedgerError::AlreadySeeded(MarketId::new("mkt-1")))
        );
    }

    #[test]
    fn buy_before_seed_rejected() {
        let now = Utc::now();
        let mut m = market(now);
        assert_eq!(
            m.buy(&holder("a"), Side::Yes, 100, 0, now),
            Err(LedgerError::InsufficientPool)
        );
    }

    #[test]
    fn buy_credits_holder_and_balance() {
        let now = Utc::now();
        let mut m = seeded(now);
        let fill = m.buy(&holder("a"), Side::Yes, 250_000, 0, now).unwrap();
        assert_eq!(fill.shares, 200_000);
        assert_eq!(m.holding(&holder("a")), Holding::new(200_000, 0));
        assert_eq!(m.balance(), 1_250_000);
        assert_eq!(m.outstanding_shares(), 200_000);
    }

    #[test]
    fn slippage_rejects_without_mutation() {
        let now = Utc::now();
        let mut m = seeded(now);
        let before = m.pools();
        let err = m.buy(&holder("a"), Side::Yes, 250_000, 200_001, now);
        assert_eq!(
            err,
            Err(LedgerError::SlippageExceeded {
                actual: 200_000,
                minimum: 200_001
            })
        );
        assert_eq!(m.pools(), before);
        assert!(m.holding(&holder("a")).is_empty());
    }

    #[test]
    fn sell_requires_shares() {
        let now = Utc::now();
        let mut m = seeded(now);
        assert!(matches!(
            m.sell(&holder("a"), Side::Yes, 10, 0, now),
            Err(LedgerError::InsufficientShares { available: 0, .. })
        ));
    }

    #[test]
    fn sell_pays_out_and_clears_empty_holding() {
        let now = Utc::now();
        let mut m = seeded(now);
        m.buy(&holder("a"), Side::Yes, 250_000, 0, now).unwrap();
        let fill = m.sell(&holder("a"), Side::Yes, 200_000, 0, now).unwrap();
        assert_eq!(fill.amount, 250_000);
        assert_eq!(m.balance(), 1_000_000);
        assert_eq!(m.summary().holders, 0);
    }

    #[test]
    fn trading_after_expiry_rejected() {
        let now = Utc::now();
        let mut m = seeded(now);
        let later = now + Duration::hours(2);
        assert_eq!(
            m.buy(&holder("a"), Side::No, 10, 0, later),
            Err(LedgerError::MarketInactive(MarketId::new("mkt-1")))
        );
    }

    #[test]
    fn resolve_before_expiry_rejected() {
        let now = Utc::now();
        let mut m = seeded(now);
        assert_eq!(
            m.resolve(dec!(71000), now),
            Err(LedgerError::NotExpired(MarketId::new("mkt-1")))
        );
    }

    #[test]
    fn resolve_is_idempotent() {
        let now = Utc::now();
        let mut m = seeded(now);
        let later = now + Duration::hours(1);
        assert_eq!(m.resolve(dec!(70000), later), Ok(Outcome::Yes));
        assert_eq!(m.resolve(dec!(1), later), Ok(Outcome::Yes));
        assert_eq!(m.settlement_price(), Some(dec!(70000)));
    }

    #[test]
    fn invalidate_only_before_resolution() {
        let now = Utc::now();
        let mut m = seeded(now);
        m.invalidate("feed outage", now).unwrap();
        assert_eq!(m.outcome(), Outcome::Invalid);
        assert_eq!(m.invalid_reason(), Some("feed outage"));
        assert!(matches!(
            m.invalidate("again", now),
            Err(LedgerError::AlreadyResolved(_))
        ));
    }

    #[test]
    fn redeem_yes_pays_yes_shares_once() {
        let now = Utc::now();
        let mut m = seeded(now);
        m.holdings.insert(holder("a"), Holding::new(5, 3));
        m.outstanding = 8;
        m.resolve(dec!(75000), now + Duration::hours(1)).unwrap();

        assert_eq!(m.redeem(&holder("a")), Ok(5));
        assert_eq!(
            m.redeem(&holder("a")),
            Err(LedgerError::NothingToRedeem(holder("a")))
        );
    }

    #[test]
    fn redeem_before_resolution_rejected() {
        let now = Utc::now();
        let mut m = seeded(now);
        m.holdings.insert(holder("a"), Holding::new(5, 0));
        assert!(matches!(
            m.redeem(&holder("a")),
            Err(LedgerError::NotResolved(_))
        ));
    }

    #[test]
    fn invalid_refund_splits_balance_by_shares() {
        let now = Utc::now();
        let mut m = seeded(now);
        m.holdings.insert(holder("a"), Holding::new(40, 10));
        m.holdings.insert(holder("b"), Holding::new(0, 50));
        m.outstanding = 100;
        m.invalidate("operator", now).unwrap();

        let a = m.redeem(&holder("a")).unwrap();
        let b = m.redeem(&holder("b")).unwrap();
        assert_eq!(a, 500_000);
        assert_eq!(b, 500_000);
        assert_eq!(m.balance(), 0);
    }

    #[test]
    fn payout_capped_at_balance() {
        let now = Utc::now();
        let mut m = seeded(now);
        m.holdings.insert(holder("a"), Holding::new(5_000_000, 0));
        m.outstanding = 5_000_000;
        m.resolve(dec!(80000), now + Duration::hours(1)).unwrap();
        assert_eq!(m.redeem(&holder("a")), Ok(1_000_000));
        assert_eq!(m.balance(), 0);
    }
}
