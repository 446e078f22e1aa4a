//! Documents held in the receipt store.
//!
//! Every document lives in a partition (normally the merchant wallet) under a deterministic id:
//!
//! | Document       | id                            | partition                 |
//! |----------------|-------------------------------|---------------------------|
//! | Receipt        | `receipt:{receiptId}`         | merchant wallet           |
//! | ReceiptTxLink  | `receipt_tx_link:{receiptId}` | the link id itself        |
//! | MerchantConfig | `site:config`                 | merchant wallet           |
//! | AuditEvent     | `audit:{uuid}`                | merchant wallet           |
//!
//! Receipts are written by other subsystems as well as this one, so they are parsed leniently and any field this crate
//! doesn't know about is carried through untouched when the receipt is rewritten.
use std::{fmt::Display, str::FromStr};

use recon_common::{
    amounts::{deserialize_lenient_decimal, deserialize_lenient_millis},
    EvmAddress,
    TxHash,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::chain_types::Transaction;

pub const RECEIPT_DOC_TYPE: &str = "receipt";
pub const LINK_DOC_TYPE: &str = "receipt_tx_link";
pub const SITE_CONFIG_DOC_TYPE: &str = "site_config";
pub const AUDIT_DOC_TYPE: &str = "audit";
pub const SITE_CONFIG_ID: &str = "site:config";

//--------------------------------------   ReceiptStatus   ---------------------------------------------------------

/// The lifecycle status of a receipt. Only the statuses that matter for reconciliation are spelled out; everything else
/// another subsystem writes is kept verbatim in [`ReceiptStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReceiptStatus {
    Generated,
    Pending,
    CheckoutInitialized,
    CheckoutSuccess,
    Edited,
    Reconciled,
    Other(String),
}

impl ReceiptStatus {
    /// Statuses from which a receipt may still be linked to a payment.
    pub fn is_reconcilable(&self) -> bool {
        matches!(
            self,
            ReceiptStatus::Generated |
                ReceiptStatus::Pending |
                ReceiptStatus::CheckoutInitialized |
                ReceiptStatus::CheckoutSuccess |
                ReceiptStatus::Edited
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            ReceiptStatus::Generated => "generated",
            ReceiptStatus::Pending => "pending",
            ReceiptStatus::CheckoutInitialized => "checkout_initialized",
            ReceiptStatus::CheckoutSuccess => "checkout_success",
            ReceiptStatus::Edited => "edited",
            ReceiptStatus::Reconciled => "reconciled",
            ReceiptStatus::Other(s) => s.as_str(),
        }
    }
}

impl Display for ReceiptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ReceiptStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "generated" => ReceiptStatus::Generated,
            "pending" => ReceiptStatus::Pending,
            "checkout_initialized" => ReceiptStatus::CheckoutInitialized,
            "checkout_success" => ReceiptStatus::CheckoutSuccess,
            "edited" => ReceiptStatus::Edited,
            "reconciled" => ReceiptStatus::Reconciled,
            _ => ReceiptStatus::Other(s.to_string()),
        }
    }
}

impl FromStr for ReceiptStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ReceiptStatus::from(s))
    }
}

impl Serialize for ReceiptStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ReceiptStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ReceiptStatus::from(s.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: ReceiptStatus,
    /// Epoch milliseconds
    pub ts: i64,
}

//--------------------------------------   Receipt   ---------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub receipt_id: String,
    /// The merchant wallet. This is also the partition key for the receipt.
    #[serde(default)]
    pub wallet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ReceiptStatus>,
    #[serde(default)]
    pub status_history: Vec<StatusEntry>,
    #[serde(default, deserialize_with = "deserialize_lenient_millis", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_lenient_millis", skip_serializing_if = "Option::is_none")]
    pub last_updated_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_token: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_decimal",
        serialize_with = "rust_decimal::serde::float_option::serialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub expected_amount_token: Option<Decimal>,
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_decimal",
        serialize_with = "rust_decimal::serde::float_option::serialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub expected_usd: Option<Decimal>,
    /// Order total in USD, used when no explicit `expectedUsd` was recorded.
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_decimal",
        serialize_with = "rust_decimal::serde::float_option::serialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_usd: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_wallet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_millis", skip_serializing_if = "Option::is_none")]
    pub transaction_timestamp: Option<i64>,
    /// Fields owned by other subsystems.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Receipt {
    pub fn new<S: Into<String>>(receipt_id: S, merchant: &EvmAddress, created_at: i64) -> Self {
        Self {
            receipt_id: receipt_id.into(),
            wallet: merchant.to_string(),
            status: Some(ReceiptStatus::Generated),
            status_history: vec![StatusEntry { status: ReceiptStatus::Generated, ts: created_at }],
            created_at: Some(created_at),
            last_updated_at: Some(created_at),
            expected_token: None,
            expected_amount_token: None,
            expected_usd: None,
            total_usd: None,
            buyer_wallet: None,
            transaction_hash: None,
            transaction_timestamp: None,
            extra: Map::new(),
        }
    }

    pub fn with_expected_token<S: Into<String>>(mut self, token: S, amount: Decimal) -> Self {
        self.expected_token = Some(token.into());
        self.expected_amount_token = Some(amount);
        self
    }

    pub fn with_expected_usd(mut self, usd: Decimal) -> Self {
        self.expected_usd = Some(usd);
        self
    }

    pub fn with_total_usd(mut self, usd: Decimal) -> Self {
        self.total_usd = Some(usd);
        self
    }

    pub fn with_buyer(mut self, buyer: &EvmAddress) -> Self {
        self.buyer_wallet = Some(buyer.to_string());
        self
    }

    pub fn with_status(mut self, status: ReceiptStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn document_id(receipt_id: &str) -> String {
        format!("receipt:{receipt_id}")
    }

    /// The linked transaction hash, if the stored value is well-formed. Garbage in `transactionHash` is treated as
    /// "not linked".
    pub fn linked_hash(&self) -> Option<TxHash> {
        self.transaction_hash.as_deref().and_then(|h| h.parse().ok())
    }

    pub fn buyer(&self) -> Option<EvmAddress> {
        self.buyer_wallet.as_deref().and_then(|w| w.parse().ok())
    }

    /// A receipt may be matched if its status is reconcilable and it has not been linked to a transaction yet.
    pub fn is_eligible(&self) -> bool {
        self.status.as_ref().map(|s| s.is_reconcilable()).unwrap_or(false) && self.linked_hash().is_none()
    }

    /// The USD amount the merchant expects for this receipt, preferring `expectedUsd` over `totalUsd`.
    pub fn usd_expectation(&self) -> Option<Decimal> {
        self.expected_usd.filter(|v| *v > Decimal::ZERO).or(self.total_usd.filter(|v| *v > Decimal::ZERO))
    }

    /// Produces the reconciled version of this receipt for the given payment.
    ///
    /// | Field                  | New value                                       |
    /// |------------------------|-------------------------------------------------|
    /// | `status`               | `reconciled`                                    |
    /// | `statusHistory`        | previous history + `{reconciled, now}`          |
    /// | `transactionHash`      | `tx.hash`                                       |
    /// | `transactionTimestamp` | `tx.timestamp`                                  |
    /// | `buyerWallet`          | unchanged if already set, otherwise `tx.from`   |
    /// | `lastUpdatedAt`        | `now`                                           |
    pub fn reconciled_with(&self, tx: &Transaction, now: i64) -> Receipt {
        let mut next = self.clone();
        next.status = Some(ReceiptStatus::Reconciled);
        next.status_history.push(StatusEntry { status: ReceiptStatus::Reconciled, ts: now });
        next.transaction_hash = Some(tx.hash.to_string());
        next.transaction_timestamp = Some(tx.timestamp);
        next.last_updated_at = Some(now);
        if next.buyer_wallet.as_deref().map(|b| b.trim().is_empty()).unwrap_or(true) {
            next.buyer_wallet = Some(tx.from.to_string());
        }
        next
    }
}

//--------------------------------------   ReceiptTxLink   ---------------------------------------------------------

/// The idempotency record. Once a link with a well-formed `txHash` exists for a receipt, that receipt is never linked
/// again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptTxLink {
    pub id: String,
    #[serde(rename = "type", default = "link_doc_type")]
    pub doc_type: String,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub merchant_wallet: String,
    #[serde(default)]
    pub linked_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

fn link_doc_type() -> String {
    LINK_DOC_TYPE.to_string()
}

impl ReceiptTxLink {
    pub fn new(
        receipt_id: &str,
        tx_hash: &TxHash,
        merchant: &EvmAddress,
        linked_at: i64,
        correlation_id: Option<String>,
    ) -> Self {
        Self {
            id: Self::link_id(receipt_id),
            doc_type: link_doc_type(),
            tx_hash: Some(tx_hash.to_string()),
            merchant_wallet: merchant.to_string(),
            linked_at,
            correlation_id,
        }
    }

    pub fn link_id(receipt_id: &str) -> String {
        format!("receipt_tx_link:{receipt_id}")
    }

    pub fn claimed_hash(&self) -> Option<TxHash> {
        self.tx_hash.as_deref().and_then(|h| h.parse().ok())
    }
}

//--------------------------------------   MerchantConfig   --------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// The merchant's `site:config` document. Only the split contract address is of interest here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<SplitSection>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MerchantConfig {
    pub fn with_split_address(split: &EvmAddress) -> Self {
        Self { split_address: Some(split.to_string()), ..Default::default() }
    }

    /// `splitAddress` takes precedence over `split.address`. Malformed values are ignored.
    pub fn split_address(&self) -> Option<EvmAddress> {
        let top = self.split_address.as_deref().and_then(|s| s.parse().ok());
        top.or_else(|| self.split.as_ref().and_then(|s| s.address.as_deref()).and_then(|s| s.parse().ok()))
    }
}

//--------------------------------------   AuditEvent   ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub who: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub what: String,
    pub target: String,
    pub correlation_id: String,
    pub ok: bool,
    #[serde(default)]
    pub metadata: Value,
    pub ts: i64,
}

impl AuditEvent {
    pub fn receipt_reconciled(receipt: &Receipt, merchant: &EvmAddress, correlation_id: &str, ts: i64) -> Self {
        let who = receipt.buyer_wallet.clone().filter(|s| !s.is_empty()).unwrap_or_else(|| "unknown".to_string());
        Self {
            id: format!("audit:{}", uuid::Uuid::new_v4()),
            doc_type: AUDIT_DOC_TYPE.to_string(),
            who,
            roles: vec![],
            what: "receipt_reconciled".to_string(),
            target: merchant.to_string(),
            correlation_id: correlation_id.to_string(),
            ok: true,
            metadata: serde_json::json!({
                "receiptId": receipt.receipt_id,
                "txHash": receipt.transaction_hash,
            }),
            ts,
        }
    }
}
