//! Constant-product pricing for binary YES/NO pools.
//!
//! ```text
//!   k = yes * no
//!
//!   buy Δ of YES:   no'  = no + Δ      yes' = ⌈k / no'⌉    shares = yes - yes'
//!   sell s of YES:  yes' = yes + s     no'  = ⌈k / yes'⌉   payout = no - no'
//! ```
//!
//! NO is the mirror image. The solved pool is always rounded **up**, so the
//! product after a trade is never below `k` and exceeds it by less than the
//! pool that was not solved for. Every function is pure: it returns the new
//! pools and leaves applying them to the caller.

use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::money::units_to_decimal;
use super::{Price, Units};

/// Basis-point denominator for fees.
pub const BPS: Units = 10_000;

/// Errors from curve arithmetic.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveError {
    #[error("amount must be positive")]
    ZeroAmount,

    #[error("pool cannot deliver a positive amount")]
    InsufficientPool,

    #[error("odds must be strictly between 0 and 1, got {0}")]
    InvalidOdds(Decimal),

    #[error("arithmetic overflow")]
    Overflow,
}

/// Outcome token side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => f.write_str("YES"),
            Side::No => f.write_str("NO"),
        }
    }
}

/// YES/NO reserve pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pools {
    pub yes: Units,
    pub no: Units,
}

/// Result of pricing a buy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuyQuote {
    pub fee: Units,
    pub shares: Units,
    pub pools_after: Pools,
}

/// Result of pricing a sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SellQuote {
    pub payout: Units,
    pub pools_after: Pools,
}

fn ceil_div(numerator: Units, denominator: Units) -> Result<Units, CurveError> {
    if denominator == 0 {
        return Err(CurveError::InsufficientPool);
    }
    let quotient = numerator / denominator;
    if numerator % denominator == 0 {
        Ok(quotient)
    } else {
        quotient.checked_add(1).ok_or(CurveError::Overflow)
    }
}

impl Pools {
    #[must_use]
    pub fn new(yes: Units, no: Units) -> Self {
        Self { yes, no }
    }

    /// Pools whose implied YES price equals `yes_odds`, summing to `2 * liquidity`.
    pub fn seeded(liquidity: Units, yes_odds: Decimal) -> Result<Self, CurveError> {
        if liquidity == 0 {
            return Err(CurveError::ZeroAmount);
        }
        if yes_odds <= Decimal::ZERO || yes_odds >= Decimal::ONE {
            return Err(CurveError::InvalidOdds(yes_odds));
        }
        let total = liquidity.checked_mul(2).ok_or(CurveError::Overflow)?;
        let no = (units_to_decimal(total) * yes_odds)
            .round()
            .to_u128()
            .ok_or(CurveError::Overflow)?;
        let yes = total.checked_sub(no).ok_or(CurveError::Overflow)?;
        if yes == 0 || no == 0 {
            return Err(CurveError::InsufficientPool);
        }
        Ok(Self { yes, no })
    }

    /// The invariant product.
    pub fn k(&self) -> Result<Units, CurveError> {
        self.yes.checked_mul(self.no).ok_or(CurveError::Overflow)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.yes == 0 || self.no == 0
    }

    /// Implied YES price, `no / (yes + no)`. Half when empty.
    #[must_use]
    pub fn yes_price(&self) -> Price {
        let total = self.yes.saturating_add(self.no);
        if total == 0 {
            return Decimal::new(5, 1);
        }
        units_to_decimal(self.no) / units_to_decimal(total)
    }

    /// Implied NO price, the complement of YES.
    #[must_use]
    pub fn no_price(&self) -> Price {
        Decimal::ONE - self.yes_price()
    }

    #[must_use]
    pub fn price(&self, side: Side) -> Price {
        match side {
            Side::Yes => self.yes_price(),
            Side::No => self.no_price(),
        }
    }

    fn get(&self, side: Side) -> Units {
        match side {
            Side::Yes => self.yes,
            Side::No => self.no,
        }
    }

    fn with(side: Side, this: Units, other: Units) -> Self {
        match side {
            Side::Yes => Self { yes: this, no: other },
            Side::No => Self { yes: other, no: this },
        }
    }

    /// Price a buy of `amount` collateral into `side`, after a `fee_bps` cut.
    pub fn quote_buy(&self, side: Side, amount: Units, fee_bps: Units) -> Result<BuyQuote, CurveError> {
        if amount == 0 {
            return Err(CurveError::ZeroAmount);
        }
        if self.is_empty() {
            return Err(CurveError::InsufficientPool);
        }
        let fee = amount
            .checked_mul(fee_bps.min(BPS))
            .ok_or(CurveError::Overflow)?
            / BPS;
        let net = amount - fee;
        if net == 0 {
            return Err(CurveError::ZeroAmount);
        }

        let k = self.k()?;
        let this = self.get(side);
        let other = self
            .get(side.opposite())
            .checked_add(net)
            .ok_or(CurveError::Overflow)?;
        let mut this_after = ceil_div(k, other)?;
        // An exact split on skewed pools would round-trip at no cost.
        if self.yes != self.no && k % other == 0 {
            this_after = this_after.checked_add(1).ok_or(CurveError::Overflow)?;
        }
        if this_after == 0 || this_after >= this {
            return Err(CurveError::InsufficientPool);
        }

        Ok(BuyQuote {
            fee,
            shares: this - this_after,
            pools_after: Self::with(side, this_after, other),
        })
    }

    /// Price selling `shares` of `side` back into the pool.
    pub fn quote_sell(&self, side: Side, shares: Units) -> Result<SellQuote, CurveError> {
        if shares == 0 {
            return Err(CurveError::ZeroAmount);
        }
        if self.is_empty() {
            return Err(CurveError::InsufficientPool);
        }

        let k = self.k()?;
        let this = self
            .get(side)
            .checked_add(shares)
            .ok_or(CurveError::Overflow)?;
        let other = self.get(side.opposite());
        let other_after = ceil_div(k, this)?;
        if other_after == 0 || other_after >= other {
            return Err(CurveError::InsufficientPool);
        }

        Ok(SellQuote {
            payout: other - other_after,
            pools_after: Self::with(side, this, other_after),
        })
    }
}
