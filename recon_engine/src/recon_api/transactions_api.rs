use std::{fmt::Debug, time::Duration};

use log::*;
use recon_common::EvmAddress;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::time::timeout;

use crate::{
    chain_types::{CumulativeTotals, Transaction, TransferKind, TxType},
    ledger::{related_transfers, to_transaction, ClassificationContext},
    recon_api::errors::TransactionsApiError,
    traits::TransactionSource,
};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// The classified transaction history of a split contract, newest first, with running totals over all of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransactionHistory {
    pub transactions: Vec<Transaction>,
    pub cumulative: CumulativeTotals,
}

impl TransactionHistory {
    pub fn payments(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|t| t.is_payment())
    }

    /// Keeps the `limit` most recent transactions. The totals are left untouched.
    pub fn truncate(&mut self, limit: usize) {
        self.transactions.truncate(limit);
    }
}

/// `TransactionsApi` turns the raw transfers reported by a [`TransactionSource`] into a classified ledger.
pub struct TransactionsApi<S> {
    source: S,
    platform_wallet: Option<EvmAddress>,
    fetch_timeout: Duration,
}

impl<S> Debug for TransactionsApi<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TransactionsApi(platform: {:?}, timeout: {:?})", self.platform_wallet, self.fetch_timeout)
    }
}

impl<S> TransactionsApi<S> {
    pub fn new(source: S, platform_wallet: Option<EvmAddress>) -> Self {
        Self { source, platform_wallet, fetch_timeout: DEFAULT_FETCH_TIMEOUT }
    }

    pub fn with_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn platform_wallet(&self) -> Option<&EvmAddress> {
        self.platform_wallet.as_ref()
    }
}

impl<S> TransactionsApi<S>
where S: TransactionSource
{
    /// Fetches and classifies every transfer touching `split`.
    ///
    /// Transfers are classified relative to `merchant` and the platform wallet. Without a merchant, every inbound
    /// transfer is treated as a payment. Native release transactions carry no value of their own, so their value and
    /// recipient are taken from the contract's `PaymentReleased` event when it can be fetched.
    pub async fn fetch_history(
        &self,
        split: &EvmAddress,
        merchant: Option<&EvmAddress>,
    ) -> Result<TransactionHistory, TransactionsApiError> {
        let transfers = timeout(self.fetch_timeout, self.source.fetch_transfers(split))
            .await
            .map_err(|_| TransactionsApiError::Timeout(self.fetch_timeout.as_secs()))??;
        debug!("📜️ {} transfers fetched for split contract {split}", transfers.len());
        let ctx = ClassificationContext::new(split.clone(), merchant.cloned(), self.platform_wallet.clone());
        let related = related_transfers(&transfers);
        let mut transactions = Vec::with_capacity(transfers.len());
        for transfer in transfers {
            if transfer.kind == TransferKind::Token && transfer.value <= Decimal::ZERO {
                continue;
            }
            let native = transfer.kind == TransferKind::Native;
            let mut tx = to_transaction(transfer, &ctx, &related);
            if native && tx.tx_type == TxType::Release {
                self.apply_release_event(&mut tx, split).await;
            }
            transactions.push(tx);
        }
        transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let cumulative = CumulativeTotals::fold(&transactions);
        Ok(TransactionHistory { transactions, cumulative })
    }

    async fn apply_release_event(&self, tx: &mut Transaction, split: &EvmAddress) {
        match timeout(self.fetch_timeout, self.source.fetch_release_event(&tx.hash, split)).await {
            Ok(Ok(Some(event))) => {
                trace!("📜️ Release {} paid {} to {}", tx.hash, event.amount, event.to);
                tx.value = event.amount;
                tx.release_to = Some(event.to);
            },
            Ok(Ok(None)) => debug!("📜️ No PaymentReleased event found for release {}", tx.hash),
            Ok(Err(e)) => warn!("📜️ Could not fetch the logs for release {}. {e}", tx.hash),
            Err(_) => warn!("📜️ Timed out fetching the logs for release {}", tx.hash),
        }
    }
}
