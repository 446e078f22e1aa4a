//! In-memory backends. Useful for replaying a known set of transfers offline, and in tests.
use std::collections::HashMap;

use recon_common::{EvmAddress, TxHash};
use rust_decimal::Decimal;

use crate::{
    chain_types::{ObservedTransfer, ReleaseEvent},
    traits::{RateOracle, RateOracleError, TransactionSource, TransactionSourceError},
};

/// A [`TransactionSource`] that serves a fixed list of transfers, whatever the split address.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransactionSource {
    transfers: Vec<ObservedTransfer>,
    release_events: HashMap<TxHash, ReleaseEvent>,
    failure: Option<String>,
}

impl MemoryTransactionSource {
    pub fn new(transfers: Vec<ObservedTransfer>) -> Self {
        Self { transfers, ..Default::default() }
    }

    /// A source whose every request fails with the given message.
    pub fn failing(message: &str) -> Self {
        Self { failure: Some(message.to_string()), ..Default::default() }
    }

    pub fn with_release_event(mut self, tx_hash: TxHash, event: ReleaseEvent) -> Self {
        self.release_events.insert(tx_hash, event);
        self
    }

    pub fn push(&mut self, transfer: ObservedTransfer) {
        self.transfers.push(transfer);
    }

    fn check(&self) -> Result<(), TransactionSourceError> {
        match &self.failure {
            Some(msg) => Err(TransactionSourceError::RequestFailed(msg.clone())),
            None => Ok(()),
        }
    }
}

impl TransactionSource for MemoryTransactionSource {
    async fn fetch_transfers(&self, _split: &EvmAddress) -> Result<Vec<ObservedTransfer>, TransactionSourceError> {
        self.check()?;
        Ok(self.transfers.clone())
    }

    async fn fetch_release_event(
        &self,
        tx_hash: &TxHash,
        _split: &EvmAddress,
    ) -> Result<Option<ReleaseEvent>, TransactionSourceError> {
        self.check()?;
        Ok(self.release_events.get(tx_hash).cloned())
    }
}

/// A [`RateOracle`] with a fixed price list. Unknown symbols are reported as unavailable.
#[derive(Debug, Clone, Default)]
pub struct StaticRateOracle {
    prices: HashMap<String, Decimal>,
}

impl StaticRateOracle {
    pub fn with_price(mut self, symbol: &str, price: Decimal) -> Self {
        self.prices.insert(symbol.to_uppercase(), price);
        self
    }
}

impl RateOracle for StaticRateOracle {
    async fn usd_price(&self, symbol: &str) -> Result<Decimal, RateOracleError> {
        self.prices.get(&symbol.to_uppercase()).copied().ok_or_else(|| RateOracleError::PriceUnavailable(symbol.into()))
    }
}
