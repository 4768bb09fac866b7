//! Opening odds for new markets.

use rust_decimal::Decimal;

use super::config::LedgerConfig;
use crate::domain::{Direction, Price};

/// Implied YES odds to seed a market with.
///
/// Symmetric (0.5) when skewing is off or there is no spot price. Otherwise
/// the odds lean toward the side the current price already satisfies, in
/// proportion to the relative distance from the strike, and are clamped to
/// `[min_yes_odds, max_yes_odds]`.
#[must_use]
pub fn opening_odds(
    config: &LedgerConfig,
    direction: Direction,
    strike: Price,
    spot: Option<Price>,
) -> Price {
    let half = Decimal::new(5, 1);
    let neutral = half.clamp(config.min_yes_odds, config.max_yes_odds);
    let Some(spot) = spot else {
        return neutral;
    };
    if !config.skew_odds || strike <= Decimal::ZERO {
        return neutral;
    }

    let Some(lean) = (spot - strike)
        .checked_div(strike)
        .and_then(|ratio| ratio.checked_mul(config.skew_sensitivity))
    else {
        return neutral;
    };
    let odds = match direction {
        Direction::Above => half.saturating_add(lean),
        Direction::Below => half.saturating_sub(lean),
    };
    odds.clamp(config.min_yes_odds, config.max_yes_odds).round_dp(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn neutral_without_price_or_skew() {
        let config = LedgerConfig::default();
        assert_eq!(opening_odds(&config, Direction::Above, dec!(100), None), dec!(0.5));
        let flat = LedgerConfig {
            skew_odds: false,
            ..LedgerConfig::default()
        };
        assert_eq!(
            opening_odds(&flat, Direction::Above, dec!(100), Some(dec!(120))),
            dec!(0.5)
        );
    }

    #[test]
    fn leans_toward_satisfied_side() {
        let config = LedgerConfig::default();
        // spot 2% above strike
        assert_eq!(
            opening_odds(&config, Direction::Above, dec!(100), Some(dec!(102))),
            dec!(0.7)
        );
        assert_eq!(
            opening_odds(&config, Direction::Below, dec!(100), Some(dec!(102))),
            dec!(0.3)
        );
    }

    #[test]
    fn unrepresentable_skew_falls_back_to_neutral() {
        let config = LedgerConfig::default();
        let tiny = Decimal::new(1, 28);
        assert_eq!(
            opening_odds(&config, Direction::Above, tiny, Some(Decimal::MAX)),
            dec!(0.5)
        );
    }

    #[test]
    fn clamped_to_bounds() {
        let config = LedgerConfig::default();
        assert_eq!(
            opening_odds(&config, Direction::Above, dec!(100), Some(dec!(200))),
            dec!(0.8)
        );
        assert_eq!(
            opening_odds(&config, Direction::Above, dec!(100), Some(dec!(50))),
            dec!(0.2)
        );
    }
}
