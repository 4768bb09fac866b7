//! Builders for domain primitives used across tests.
//!
//! Concise factories so tests focus on assertions rather than
//! construction boilerplate.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    Category, Direction, HolderId, Market, MarketRef, OracleSnapshot, Price, PricePoint, Proposal,
    ProposalDraft, ProposalId, Units,
};

/// Fixed reference instant: 2026-01-01 12:00:00 UTC.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// A valid draft for `asset` at `strike`, expiring in an hour.
pub fn draft(asset: &str, strike: Price, direction: Direction) -> ProposalDraft {
    ProposalDraft::builder()
        .question(format!(
            "Will {asset} trade {} {strike} within 60 minutes?",
            direction.as_word()
        ))
        .asset(asset)
        .strike(strike)
        .direction(direction)
        .duration(Duration::minutes(60))
        .category(Category::Manual)
        .confidence(Decimal::new(5, 1))
        .build()
}

/// An accepted proposal created at `now`.
pub fn proposal(asset: &str, strike: Price, direction: Direction, now: DateTime<Utc>) -> Proposal {
    Proposal::from_draft(ProposalId::generate(), draft(asset, strike, direction), now)
}

/// Unseeded market backed by a simulated reference.
pub fn market(proposal: &Proposal, fee_bps: Units, now: DateTime<Utc>) -> Market {
    Market::from_proposal(
        proposal,
        MarketRef::simulated(format!("test-{}", proposal.id())),
        fee_bps,
        now,
    )
    .expect("test market expiry should be representable")
}

/// Snapshot with prices given as decimals, all stamped at `at`.
pub fn snapshot(prices: &[(&str, Price)], at: DateTime<Utc>) -> OracleSnapshot {
    let mut snap = OracleSnapshot::empty().with_fetched_at(at);
    for (symbol, price) in prices {
        if let Some(point) = PricePoint::from_price(*price, at) {
            snap.insert(*symbol, point);
        }
    }
    snap
}

pub fn holder(name: &str) -> HolderId {
    HolderId::new(name)
}
