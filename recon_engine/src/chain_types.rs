//! On-chain value types.
//!
//! [`ObservedTransfer`] is what a [`crate::traits::TransactionSource`] hands over: a native transaction or an ERC-20
//! transfer that touched the split contract, already validated at the boundary. The ledger turns those into classified
//! [`Transaction`]s.
use std::collections::BTreeMap;

use recon_common::{EvmAddress, TxHash};
use rust_decimal::Decimal;
use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};

/// Symbol used for the chain's native asset.
pub const NATIVE_TOKEN: &str = "ETH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    /// A top-level transaction carrying (possibly zero) native value.
    Native,
    /// An ERC-20 `Transfer` event.
    Token,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedTransfer {
    pub hash: TxHash,
    pub kind: TransferKind,
    pub from: EvmAddress,
    pub to: EvmAddress,
    /// Amount in whole token units (i.e. already divided by 10^decimals)
    pub value: Decimal,
    pub token: String,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub block_number: u64,
    pub status: String,
}

/// The decoded `PaymentReleased(address to, uint256 amount)` event emitted by the split contract on `release()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseEvent {
    pub to: EvmAddress,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxType {
    Payment,
    Release,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    Merchant,
    Platform,
}

/// A token transfer that shares its hash with a native transaction, e.g. the ERC-20 leg of a zero-value contract call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedTransfer {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
    pub to: EvmAddress,
    pub from: EvmAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: TxHash,
    pub from: EvmAddress,
    pub to: EvmAddress,
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
    pub token: String,
    pub timestamp: i64,
    pub block_number: u64,
    pub status: String,
    #[serde(rename = "type")]
    pub tx_type: TxType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_type: Option<ReleaseType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_to: Option<EvmAddress>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_tokens: Vec<RelatedTransfer>,
}

impl Transaction {
    pub fn is_payment(&self) -> bool {
        self.tx_type == TxType::Payment
    }
}

/// Per-token running totals over a list of transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeTotals {
    #[serde(serialize_with = "serialize_totals")]
    pub payments: BTreeMap<String, Decimal>,
    #[serde(serialize_with = "serialize_totals")]
    pub merchant_releases: BTreeMap<String, Decimal>,
    #[serde(serialize_with = "serialize_totals")]
    pub platform_releases: BTreeMap<String, Decimal>,
}

impl CumulativeTotals {
    /// Folds the totals over `transactions`. Payments count towards `payments`; releases count towards the bucket of
    /// their release type. Releases to unknown recipients and unclassified transfers are ignored.
    pub fn fold<'a, I: IntoIterator<Item = &'a Transaction>>(transactions: I) -> Self {
        transactions.into_iter().fold(Self::default(), |mut totals, tx| {
            let bucket = match (tx.tx_type, tx.release_type) {
                (TxType::Payment, _) => Some(&mut totals.payments),
                (TxType::Release, Some(ReleaseType::Merchant)) => Some(&mut totals.merchant_releases),
                (TxType::Release, Some(ReleaseType::Platform)) => Some(&mut totals.platform_releases),
                _ => None,
            };
            if let Some(bucket) = bucket {
                *bucket.entry(tx.token.clone()).or_default() += tx.value;
            }
            totals
        })
    }
}

fn serialize_totals<S: Serializer>(totals: &BTreeMap<String, Decimal>, serializer: S) -> Result<S::Ok, S::Error> {
    use rust_decimal::prelude::ToPrimitive;
    let mut map = serializer.serialize_map(Some(totals.len()))?;
    for (token, amount) in totals {
        map.serialize_entry(token, &amount.to_f64().unwrap_or_default())?;
    }
    map.end()
}
