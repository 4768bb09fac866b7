//! Market Ledger behaviour through the public API.

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal_macros::dec;

use foresight::domain::{
    Direction, MarketId, MarketRef, Outcome, Proposal, ProposalId, Side, Units,
};
use foresight::error::LedgerError;
use foresight::service::MarketLedger;
use foresight::testkit::domain::{draft, holder, proposal};

const LIQUIDITY: Units = 1_000_000_000;

fn ledger(fee_bps: Units, yes_odds: rust_decimal::Decimal) -> (MarketLedger, MarketId) {
    let now = Utc::now();
    let ledger = MarketLedger::new(fee_bps);
    let p = proposal("BTC/USD", dec!(70000), Direction::Above, now);
    let summary = ledger
        .create_market(&p, MarketRef::simulated("sim-test"), now)
        .unwrap();
    ledger.seed(&summary.id, LIQUIDITY, yes_odds).unwrap();
    (ledger, summary.id)
}

fn product(ledger: &MarketLedger, id: &MarketId) -> (Units, Units, Units) {
    let pools = ledger.snapshot(id).unwrap().pools;
    (pools.yes * pools.no, pools.yes, pools.no)
}

#[test]
fn product_holds_across_random_trades() {
    let (ledger, id) = ledger(0, dec!(0.5));
    let now = Utc::now();
    let traders = [holder("a"), holder("b"), holder("c")];
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..200 {
        let (k_before, _, _) = product(&ledger, &id);
        let who = &traders[rng.gen_range(0..traders.len())];
        let side = if rng.gen_bool(0.5) { Side::Yes } else { Side::No };

        let held = ledger.holding(&id, who).unwrap().get(side);
        let traded = if held > 0 && rng.gen_bool(0.4) {
            let shares = rng.gen_range(1..=held);
            ledger.sell(&id, who, side, shares, 0, now).map(|f| f.pools_after)
        } else {
            let amount = rng.gen_range(1_000..50_000_000);
            ledger.buy(&id, who, side, amount, 0, now).map(|f| f.pools_after)
        };

        if let Ok(pools) = traded {
            let (k_after, yes, no) = product(&ledger, &id);
            assert_eq!(pools.yes * pools.no, k_after);
            assert!(k_after >= k_before, "product fell: {k_before} -> {k_after}");
            assert!(
                k_after - k_before <= yes.max(no),
                "rounding drift too large: {k_before} -> {k_after}"
            );
        }
    }
}

#[test]
fn wash_trade_never_profits() {
    let now = Utc::now();
    let trader = holder("wash");
    for (fee_bps, odds) in [(0, dec!(0.5)), (0, dec!(0.3)), (100, dec!(0.5)), (100, dec!(0.7))] {
        for delta in [1_000u128, 123_457, 10_000_000, 250_000_000] {
            let (ledger, id) = ledger(fee_bps, odds);
            let bought = ledger.buy(&id, &trader, Side::Yes, delta, 0, now).unwrap();
            let sold = ledger
                .sell(&id, &trader, Side::Yes, bought.shares, 0, now)
                .unwrap();
            assert!(sold.amount <= delta, "payout {} > {delta}", sold.amount);
            if fee_bps > 0 || odds != dec!(0.5) {
                assert!(sold.amount < delta, "fee {fee_bps} odds {odds}: no loss");
            }
        }
    }
}

#[test]
fn skewed_wash_trade_loses_even_on_exact_division() {
    let now = Utc::now();
    let ledger = MarketLedger::new(0);
    let p = proposal("BTC/USD", dec!(70000), Direction::Above, now);
    let id = ledger
        .create_market(&p, MarketRef::simulated("sim-exact"), now)
        .unwrap()
        .id;
    ledger.seed(&id, 1_000, dec!(0.7)).unwrap();
    let pools = ledger.snapshot(&id).unwrap().pools;
    assert_eq!((pools.yes, pools.no), (600, 1_400));

    let trader = holder("wash");
    let bought = ledger.buy(&id, &trader, Side::Yes, 100, 0, now).unwrap();
    let sold = ledger
        .sell(&id, &trader, Side::Yes, bought.shares, 0, now)
        .unwrap();
    assert!(sold.amount < 100, "payout {} returned the full delta", sold.amount);
}

#[test]
fn unrepresentable_expiry_is_rejected() {
    let now = Utc::now();
    let ledger = MarketLedger::new(100);
    let mut d = draft("BTC/USD", dec!(70000), Direction::Above);
    d.duration = Duration::weeks(100_000_000);
    let p = Proposal::from_draft(ProposalId::new("prop-far"), d, now);

    assert!(matches!(
        ledger.create_market(&p, MarketRef::simulated("sim-far"), now),
        Err(LedgerError::ExpiryOutOfRange(_))
    ));
    assert!(ledger.is_empty());
}

#[test]
fn resolved_market_redeems_winners_once() {
    let (ledger, id) = ledger(100, dec!(0.5));
    let now = Utc::now();
    let alice = holder("alice");
    let bob = holder("bob");
    let yes = ledger.buy(&id, &alice, Side::Yes, 5_000_000, 0, now).unwrap();
    ledger.buy(&id, &bob, Side::No, 5_000_000, 0, now).unwrap();

    assert!(matches!(
        ledger.resolve(&id, dec!(71000), now),
        Err(LedgerError::NotExpired(_))
    ));
    let expiry = ledger.snapshot(&id).unwrap().expires_at;
    assert_eq!(ledger.resolve(&id, dec!(71000), expiry), Ok(Outcome::Yes));
    // idempotent
    assert_eq!(ledger.resolve(&id, dec!(60000), expiry), Ok(Outcome::Yes));

    assert_eq!(ledger.redeem(&id, &alice), Ok(yes.shares));
    assert_eq!(
        ledger.redeem(&id, &alice),
        Err(LedgerError::NothingToRedeem(alice.clone()))
    );
    assert_eq!(
        ledger.redeem(&id, &bob),
        Err(LedgerError::NothingToRedeem(bob.clone()))
    );
    assert!(matches!(
        ledger.buy(&id, &bob, Side::Yes, 1_000, 0, expiry),
        Err(LedgerError::MarketInactive(_))
    ));
}

#[test]
fn invalid_market_refunds_pro_rata() {
    let (ledger, id) = ledger(0, dec!(0.5));
    let now = Utc::now();
    let alice = holder("alice");
    let bob = holder("bob");
    let a = ledger.buy(&id, &alice, Side::Yes, 20_000_000, 0, now).unwrap();
    let b = ledger.buy(&id, &bob, Side::No, 20_000_000, 0, now).unwrap();
    let balance = ledger.snapshot(&id).unwrap().balance;
    let outstanding = a.shares + b.shares;

    ledger.invalidate(&id, "oracle outage", now).unwrap();
    let refund_a = ledger.redeem(&id, &alice).unwrap();
    let refund_b = ledger.redeem(&id, &bob).unwrap();

    assert_eq!(refund_a, a.shares * balance / outstanding);
    assert!(refund_a + refund_b <= balance);
    assert!(ledger.snapshot(&id).unwrap().balance < 2);
    assert!(matches!(
        ledger.invalidate(&id, "again", now),
        Err(LedgerError::AlreadyResolved(_))
    ));
}

#[test]
fn failed_trade_leaves_market_untouched() {
    let (ledger, id) = ledger(100, dec!(0.5));
    let now = Utc::now();
    let before = ledger.snapshot(&id).unwrap();

    let err = ledger
        .buy(&id, &holder("greedy"), Side::Yes, 1_000_000, u128::MAX, now)
        .unwrap_err();
    assert!(matches!(err, LedgerError::SlippageExceeded { .. }));
    let err = ledger
        .sell(&id, &holder("nobody"), Side::No, 10, 0, now)
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientShares { .. }));
    assert!(matches!(
        ledger.buy(&id, &holder("late"), Side::Yes, 1_000, 0, now + Duration::days(1)),
        Err(LedgerError::MarketInactive(_))
    ));

    assert_eq!(ledger.snapshot(&id).unwrap(), before);
}
