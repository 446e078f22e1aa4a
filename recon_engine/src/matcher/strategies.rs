use rust_decimal::Decimal;

use super::{
    pricing::{relative_deviation, within_tolerance, within_tolerance_with_floor},
    MatchContext,
    MatchStrategy,
};
use crate::{chain_types::Transaction, db_types::Receipt};

/// The receipt names the transaction's token, and either the token amount or its USD value is within tolerance.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenAmountStrategy;

impl MatchStrategy for TokenAmountStrategy {
    fn name(&self) -> &'static str {
        "token_amount"
    }

    fn evaluate(&self, tx: &Transaction, receipt: &Receipt, ctx: &MatchContext) -> Option<Decimal> {
        let token = receipt.expected_token.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
        if !token.eq_ignore_ascii_case(&tx.token) || !ctx.in_window(tx, receipt) {
            return None;
        }
        let amount_fit = receipt.expected_amount_token.and_then(|expected| {
            let floor = ctx.prices.floor_in_tokens(&tx.token);
            within_tolerance_with_floor(expected, tx.value, ctx.tolerance_pct, floor)
                .then(|| relative_deviation(expected, tx.value))
        });
        let usd_fit = receipt.expected_usd.and_then(|expected| {
            let actual = ctx.prices.to_usd(&tx.token, tx.value);
            within_tolerance(expected, actual, ctx.tolerance_pct).then(|| relative_deviation(expected, actual))
        });
        match (amount_fit, usd_fit) {
            (Some(a), Some(u)) => Some(a.min(u)),
            (a, u) => a.or(u),
        }
    }
}

/// The transaction's USD value is within tolerance of the receipt's USD expectation.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsdValueStrategy;

impl MatchStrategy for UsdValueStrategy {
    fn name(&self) -> &'static str {
        "usd_value"
    }

    fn evaluate(&self, tx: &Transaction, receipt: &Receipt, ctx: &MatchContext) -> Option<Decimal> {
        let expected = receipt.usd_expectation()?;
        if !ctx.in_window(tx, receipt) {
            return None;
        }
        let actual = ctx.prices.to_usd(&tx.token, tx.value);
        within_tolerance(expected, actual, ctx.tolerance_pct).then(|| relative_deviation(expected, actual))
    }
}

/// The receipt's recorded buyer sent the transaction. The closest receipt in time wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuyerWalletStrategy;

impl MatchStrategy for BuyerWalletStrategy {
    fn name(&self) -> &'static str {
        "buyer_wallet"
    }

    fn evaluate(&self, tx: &Transaction, receipt: &Receipt, ctx: &MatchContext) -> Option<Decimal> {
        let buyer = receipt.buyer()?;
        if buyer != tx.from || !ctx.in_window(tx, receipt) {
            return None;
        }
        let distance = (tx.timestamp - ctx.created_at(receipt)).abs();
        Some(Decimal::from(distance))
    }
}
