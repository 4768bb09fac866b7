//! Numeric aliases shared by the domain.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// Price or probability, as an exact decimal.
pub type Price = Decimal;

/// Collateral, pool reserves and shares in integer base units.
pub type Units = u128;

/// Convert base units to a decimal, saturating at `Decimal::MAX`.
#[must_use]
pub fn units_to_decimal(units: Units) -> Decimal {
    Decimal::from_u128(units).unwrap_or(Decimal::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_to_decimal_small_values() {
        assert_eq!(units_to_decimal(0), Decimal::ZERO);
        assert_eq!(units_to_decimal(1_000_000), Decimal::from(1_000_000));
    }

    #[test]
    fn units_to_decimal_saturates() {
        assert_eq!(units_to_decimal(u128::MAX), Decimal::MAX);
    }
}
