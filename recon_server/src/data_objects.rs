use recon_common::{
    helpers::{deserialize_lenient_string, deserialize_lenient_string_or_empty},
    EvmAddress,
};
use recon_engine::{
    recon_objects::{ReconcileParams, ReconcileRequest, ReconcileResult},
    ReconcileError,
    TransactionHistory,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_TRANSACTIONS_LIMIT: i64 = 50;
pub const MAX_TRANSACTIONS_LIMIT: i64 = 100;
pub const DEFAULT_WEBHOOK_TRIGGER: &str = "manual";

/// Query string of `GET /transactions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsQuery {
    pub split_address: Option<String>,
    pub merchant_wallet: Option<String>,
    pub limit: Option<String>,
}

impl TransactionsQuery {
    /// The requested page size, in `1..=100`. Missing or unreadable values give the default of 50.
    pub fn limit(&self) -> usize {
        let limit = self.limit.as_deref().and_then(|s| s.trim().parse::<f64>().ok()).filter(|v| v.is_finite());
        let limit = limit.map(|v| v.floor() as i64);
        recon_common::helpers::clamp_or_default(limit, DEFAULT_TRANSACTIONS_LIMIT, 1, MAX_TRANSACTIONS_LIMIT) as usize
    }

    /// The merchant wallet, if a valid one was given. Without it, releases cannot be told apart from payments.
    pub fn merchant(&self) -> Option<EvmAddress> {
        self.merchant_wallet.as_deref().and_then(|s| s.parse().ok())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionsResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub history: TransactionHistory,
}

impl TransactionsResponse {
    pub fn new(history: TransactionHistory) -> Self {
        Self { ok: true, history }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub result: ReconcileResult,
}

impl ReconcileResponse {
    pub fn new(result: ReconcileResult) -> Self {
        Self { ok: true, result }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new<S: Into<String>>(error: S) -> Self {
        Self { ok: false, error: error.into() }
    }
}

/// Body of `POST /webhook/split`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookParams {
    #[serde(default, deserialize_with = "deserialize_lenient_string_or_empty")]
    pub split_address: String,
    #[serde(default, deserialize_with = "deserialize_lenient_string_or_empty")]
    pub merchant_wallet: String,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub trigger: Option<String>,
    #[serde(default)]
    pub tx_hashes: Option<Value>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub correlation_id: Option<String>,
}

impl WebhookParams {
    pub fn trigger(&self) -> String {
        self.trigger
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_WEBHOOK_TRIGGER)
            .to_string()
    }

    /// Validates both addresses and builds the reconciliation the webhook should run. The run is targeted when valid
    /// transaction hashes were supplied.
    pub fn into_request(self, fallback_correlation_id: &str) -> Result<ReconcileRequest, ReconcileError> {
        if !EvmAddress::is_valid(&self.split_address) {
            return Err(ReconcileError::InvalidSplitAddress(self.split_address));
        }
        let params = ReconcileParams {
            merchant_wallet: self.merchant_wallet,
            split_address: Some(self.split_address),
            tx_hashes: self.tx_hashes,
            correlation_id: self.correlation_id,
            ..Default::default()
        };
        params.into_request(fallback_correlation_id)
    }
}

/// The outcome of the reconciliation a webhook call triggered.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WebhookReconcileSummary {
    Completed(ReconcileResponse),
    Failed(ErrorResponse),
}

impl From<Result<ReconcileResult, ReconcileError>> for WebhookReconcileSummary {
    fn from(result: Result<ReconcileResult, ReconcileError>) -> Self {
        match result {
            Ok(r) => Self::Completed(ReconcileResponse::new(r)),
            Err(e) => Self::Failed(ErrorResponse::new(e.code())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
    pub trigger: String,
    pub reconcile: WebhookReconcileSummary,
}
