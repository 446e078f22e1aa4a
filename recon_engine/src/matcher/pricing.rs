//! Price lookups and the tolerance rule.
use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// The absolute slippage, in USD, that is always tolerated regardless of the percentage tolerance.
pub const USD_TOLERANCE_FLOOR: Decimal = dec!(5);

/// Prices used when the rate oracle has nothing better. Keys are upper-case symbols.
pub const FALLBACK_PRICES: [(&str, Decimal); 5] =
    [("ETH", dec!(2500)), ("USDC", dec!(1)), ("USDT", dec!(1)), ("CBBTC", dec!(65000)), ("CBXRP", dec!(0.5))];

/// `|actual - expected| <= max(pct% × expected, floor)`. Both values must be strictly positive.
pub fn within_tolerance_with_floor(expected: Decimal, actual: Decimal, pct: Decimal, floor: Decimal) -> bool {
    if expected <= Decimal::ZERO || actual <= Decimal::ZERO {
        return false;
    }
    let allowed = (pct / dec!(100) * expected).max(floor);
    (actual - expected).abs() <= allowed
}

/// [`within_tolerance_with_floor`] with the standard $5 floor.
pub fn within_tolerance(expected: Decimal, actual: Decimal, pct: Decimal) -> bool {
    within_tolerance_with_floor(expected, actual, pct, USD_TOLERANCE_FLOOR)
}

/// Relative distance between `actual` and `expected`. Used to rank candidates that pass the same check.
pub fn relative_deviation(expected: Decimal, actual: Decimal) -> Decimal {
    if expected.is_zero() {
        return Decimal::MAX;
    }
    ((actual - expected) / expected).abs()
}

/// USD prices per token symbol. Lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceTable {
    prices: HashMap<String, Decimal>,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::with_fallbacks()
    }
}

impl PriceTable {
    /// A table pre-loaded with [`FALLBACK_PRICES`].
    pub fn with_fallbacks() -> Self {
        let prices = FALLBACK_PRICES.iter().map(|(s, p)| (s.to_string(), *p)).collect();
        Self { prices }
    }

    pub fn empty() -> Self {
        Self { prices: HashMap::new() }
    }

    pub fn set_price(&mut self, symbol: &str, price: Decimal) -> &mut Self {
        self.prices.insert(symbol.to_ascii_uppercase(), price);
        self
    }

    /// The USD price for `symbol`, or zero if it is unknown. Zero-priced tokens can never match on value.
    pub fn price(&self, symbol: &str) -> Decimal {
        self.prices.get(&symbol.to_ascii_uppercase()).copied().unwrap_or_default()
    }

    /// `amount × price`, rounded to the cent.
    pub fn to_usd(&self, symbol: &str, amount: Decimal) -> Decimal {
        (amount * self.price(symbol)).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    /// The USD tolerance floor expressed in units of `symbol`. Zero when the price is unknown.
    pub fn floor_in_tokens(&self, symbol: &str) -> Decimal {
        let price = self.price(symbol);
        if price > Decimal::ZERO {
            USD_TOLERANCE_FLOOR / price
        } else {
            Decimal::ZERO
        }
    }
}
