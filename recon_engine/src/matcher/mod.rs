//! # Matching
//!
//! Decides which pending receipt (if any) a payment transaction settles. There is no shared key between the two, so
//! matching is fuzzy: a [`MatchEngine`] runs a list of [`MatchStrategy`]s in priority order and the first strategy
//! that accepts any candidate decides the match.
//!
//! The default strategies are, in order:
//!
//! 1. [`TokenAmountStrategy`]: same token, and token amount or USD value within tolerance.
//! 2. [`UsdValueStrategy`]: USD value within tolerance of the receipt's USD expectation.
//! 3. [`BuyerWalletStrategy`]: the receipt's buyer sent the transaction.
//!
//! Every strategy also requires the transaction to fall inside the time window around the receipt's creation time
//! (inclusive at both ends).
//!
//! When several candidates pass the winning strategy, the tightest fit wins: each strategy scores the candidates it
//! accepts (lower is better) and the lowest score is chosen. Equal scores go to the earlier candidate.
//!
//! Matching is pure. Prices are resolved before the engine is invoked and passed in via [`MatchContext`].
mod pricing;
mod strategies;

use std::fmt::Debug;

pub use pricing::{
    relative_deviation,
    within_tolerance,
    within_tolerance_with_floor,
    PriceTable,
    FALLBACK_PRICES,
    USD_TOLERANCE_FLOOR,
};
use rust_decimal::Decimal;
pub use strategies::{BuyerWalletStrategy, TokenAmountStrategy, UsdValueStrategy};

use crate::{chain_types::Transaction, db_types::Receipt};

/// One way of recognising that a transaction pays a receipt.
pub trait MatchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns a fit score (lower is better) if `receipt` is acceptable for `tx` under this strategy, or `None`.
    fn evaluate(&self, tx: &Transaction, receipt: &Receipt, ctx: &MatchContext) -> Option<Decimal>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchContext {
    pub time_window_ms: i64,
    pub tolerance_pct: Decimal,
    pub prices: PriceTable,
    /// Stand-in creation time for receipts that lack `createdAt`.
    pub now: i64,
}

impl MatchContext {
    pub fn new(time_window_ms: i64, tolerance_pct: Decimal, prices: PriceTable, now: i64) -> Self {
        Self { time_window_ms, tolerance_pct, prices, now }
    }

    pub fn created_at(&self, receipt: &Receipt) -> i64 {
        receipt.created_at.unwrap_or(self.now)
    }

    /// `createdAt - window <= tx.timestamp <= createdAt + window`
    pub fn in_window(&self, tx: &Transaction, receipt: &Receipt) -> bool {
        let created = self.created_at(receipt);
        let start = created.saturating_sub(self.time_window_ms);
        let end = created.saturating_add(self.time_window_ms);
        (start..=end).contains(&tx.timestamp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// Index into the candidate list
    pub index: usize,
    pub strategy: &'static str,
    pub score: Decimal,
}

pub struct MatchEngine {
    strategies: Vec<Box<dyn MatchStrategy>>,
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::new(vec![Box::new(TokenAmountStrategy), Box::new(UsdValueStrategy), Box::new(BuyerWalletStrategy)])
    }
}

impl Debug for MatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = self.strategies.iter().map(|s| s.name()).collect::<Vec<_>>();
        write!(f, "MatchEngine({})", names.join(" > "))
    }
}

impl MatchEngine {
    /// Creates an engine that tries `strategies` in the given order.
    pub fn new(strategies: Vec<Box<dyn MatchStrategy>>) -> Self {
        Self { strategies }
    }

    /// The receipt that `tx` settles, if any. Transactions that carry no value never settle a receipt, whichever
    /// strategies are configured.
    pub fn find_match(&self, tx: &Transaction, candidates: &[Receipt], ctx: &MatchContext) -> Option<Match> {
        if candidates.is_empty() || tx.value <= Decimal::ZERO {
            return None;
        }
        self.strategies.iter().find_map(|strategy| {
            let best = candidates.iter().enumerate().fold(None, |best: Option<(usize, Decimal)>, (i, receipt)| {
                match (strategy.evaluate(tx, receipt, ctx), best) {
                    (Some(score), Some((_, best_score))) if score < best_score => Some((i, score)),
                    (Some(score), None) => Some((i, score)),
                    (_, best) => best,
                }
            });
            best.map(|(index, score)| Match { index, strategy: strategy.name(), score })
        })
    }
}
