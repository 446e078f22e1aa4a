use recon_common::{
    amounts::{deserialize_lenient_decimal, deserialize_lenient_millis},
    helpers::{deserialize_lenient_string, deserialize_lenient_string_or_empty},
    EvmAddress,
    TxHash,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::recon_api::errors::ReconcileError;

pub const DEFAULT_TIME_WINDOW_MS: i64 = 7_200_000;
pub const MIN_TIME_WINDOW_MS: i64 = 60_000;
pub const DEFAULT_TOLERANCE_PCT: Decimal = dec!(20);
pub const MAX_TOLERANCE_PCT: Decimal = dec!(100);

/// Matching parameters for a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub time_window_ms: i64,
    pub tolerance_pct: Decimal,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self { time_window_ms: DEFAULT_TIME_WINDOW_MS, tolerance_pct: DEFAULT_TOLERANCE_PCT }
    }
}

impl ReconcileOptions {
    /// Applies defaults to missing values. The window is at least one minute; the tolerance lies in `[0, 100]`.
    pub fn new(time_window_ms: Option<i64>, tolerance_pct: Option<Decimal>) -> Self {
        let time_window_ms = time_window_ms.unwrap_or(DEFAULT_TIME_WINDOW_MS).max(MIN_TIME_WINDOW_MS);
        let tolerance_pct = tolerance_pct.unwrap_or(DEFAULT_TOLERANCE_PCT).clamp(Decimal::ZERO, MAX_TOLERANCE_PCT);
        Self { time_window_ms, tolerance_pct }
    }
}

/// A reconciliation request as it arrives over the wire. Nothing here has been validated yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileParams {
    #[serde(default, deserialize_with = "deserialize_lenient_string_or_empty")]
    pub merchant_wallet: String,
    #[serde(default, deserialize_with = "deserialize_lenient_string", skip_serializing_if = "Option::is_none")]
    pub split_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hashes: Option<Value>,
    #[serde(default, deserialize_with = "deserialize_lenient_millis", skip_serializing_if = "Option::is_none")]
    pub time_window_ms: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_lenient_decimal", skip_serializing_if = "Option::is_none")]
    pub tolerance_pct: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_lenient_string", skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string", skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// A validated reconciliation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileRequest {
    pub merchant: EvmAddress,
    /// When absent, the split address is looked up in the merchant's configuration.
    pub split: Option<EvmAddress>,
    /// Non-empty for a targeted run; empty for a scan.
    pub tx_hashes: Vec<TxHash>,
    pub receipt_id: Option<String>,
    pub options: ReconcileOptions,
    pub correlation_id: String,
}

impl ReconcileRequest {
    pub fn scan(merchant: EvmAddress, split: Option<EvmAddress>, correlation_id: String) -> Self {
        Self {
            merchant,
            split,
            tx_hashes: vec![],
            receipt_id: None,
            options: ReconcileOptions::default(),
            correlation_id,
        }
    }

    pub fn targeted(
        merchant: EvmAddress,
        split: Option<EvmAddress>,
        tx_hashes: Vec<TxHash>,
        correlation_id: String,
    ) -> Self {
        Self { tx_hashes, ..Self::scan(merchant, split, correlation_id) }
    }

    pub fn with_receipt_id<S: Into<String>>(mut self, receipt_id: S) -> Self {
        self.receipt_id = Some(receipt_id.into());
        self
    }

    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn is_targeted(&self) -> bool {
        !self.tx_hashes.is_empty()
    }
}

impl ReconcileParams {
    /// Validates and normalises the parameters.
    ///
    /// * The merchant wallet must be a valid address.
    /// * A malformed split address is treated as absent, so that the merchant's configured address is used instead.
    /// * Malformed transaction hashes are dropped and duplicates removed, keeping the first occurrence.
    /// * A blank `receiptId` is ignored.
    /// * The body's `correlationId` takes precedence over `fallback_correlation_id`.
    pub fn into_request(self, fallback_correlation_id: &str) -> Result<ReconcileRequest, ReconcileError> {
        let merchant = self
            .merchant_wallet
            .parse::<EvmAddress>()
            .map_err(|_| ReconcileError::InvalidMerchantWallet(self.merchant_wallet.clone()))?;
        let split = self.split_address.as_deref().and_then(|s| s.parse::<EvmAddress>().ok());
        let mut tx_hashes: Vec<TxHash> = Vec::new();
        if let Some(Value::Array(items)) = &self.tx_hashes {
            for hash in items.iter().filter_map(|v| v.as_str()).filter_map(|s| s.parse::<TxHash>().ok()) {
                if !tx_hashes.contains(&hash) {
                    tx_hashes.push(hash);
                }
            }
        }
        let receipt_id = self.receipt_id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let correlation_id = self
            .correlation_id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| fallback_correlation_id.to_string());
        Ok(ReconcileRequest {
            merchant,
            split,
            tx_hashes,
            receipt_id,
            options: ReconcileOptions::new(self.time_window_ms, self.tolerance_pct),
            correlation_id,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileResult {
    /// Number of receipts linked in this run
    pub reconciled: usize,
    /// Hashes that could not be matched. Only reported for targeted runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmatched: Option<Vec<TxHash>>,
}
