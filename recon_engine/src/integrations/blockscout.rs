//! A [`TransactionSource`] backed by the Blockscout v2 REST API.
//!
//! Three endpoints are used:
//! * `/addresses/{split}/transactions` for native transactions,
//! * `/addresses/{split}/token-transfers` for ERC-20 transfers,
//! * `/transactions/{hash}/logs` to decode `PaymentReleased` events.
//!
//! Only the first page of each listing is read.
use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use log::*;
use recon_common::{amounts::parse_decimal, EvmAddress, Secret, TxHash};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT},
    Client,
};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::{
    chain_types::{ObservedTransfer, ReleaseEvent, TransferKind, NATIVE_TOKEN},
    traits::{TransactionSource, TransactionSourceError},
};

pub const DEFAULT_BLOCKSCOUT_URL: &str = "https://base.blockscout.com/api/v2";
/// `keccak256("PaymentReleased(address,uint256)")`
pub const PAYMENT_RELEASED_TOPIC: &str = "0xdf20fd1e76bc69d672e4814fafb2c449bba3a5369d8359adf9e05e6fde87b056";
pub const SUPPORTED_TOKENS: [&str; 5] = ["USDC", "USDT", "cbBTC", "cbXRP", "SOL"];
const NATIVE_DECIMALS: u32 = 18;

/// Maps ERC-20 contract addresses to the symbols the engine knows about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenRegistry {
    by_address: HashMap<EvmAddress, String>,
}

impl TokenRegistry {
    /// Registers `address` as the contract for `symbol`. Unsupported symbols are ignored.
    pub fn with_token(mut self, symbol: &str, address: EvmAddress) -> Self {
        match SUPPORTED_TOKENS.iter().find(|s| s.eq_ignore_ascii_case(symbol)) {
            Some(s) => {
                self.by_address.insert(address, s.to_string());
            },
            None => warn!("🔗️ {symbol} is not a supported token. Ignoring its contract address {address}"),
        }
        self
    }

    /// Resolves a token by contract address, falling back on the indexer's symbol. Returns `None` for unsupported
    /// tokens.
    pub fn resolve(&self, address: Option<&str>, symbol: Option<&str>) -> Option<String> {
        let by_address = address.and_then(|a| a.parse::<EvmAddress>().ok()).and_then(|a| self.by_address.get(&a));
        if let Some(symbol) = by_address {
            return Some(symbol.clone());
        }
        let symbol = symbol?.to_uppercase();
        let resolved = if symbol.contains("USDC") {
            "USDC"
        } else if symbol.contains("USDT") {
            "USDT"
        } else if symbol.contains("BTC") {
            "cbBTC"
        } else if symbol.contains("XRP") {
            "cbXRP"
        } else if symbol.contains("SOL") {
            "SOL"
        } else {
            return None;
        };
        Some(resolved.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct BlockscoutConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
    pub timeout: Duration,
    pub tokens: TokenRegistry,
}

impl Default for BlockscoutConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BLOCKSCOUT_URL.to_string(),
            api_key: Secret::default(),
            timeout: Duration::from_secs(20),
            tokens: TokenRegistry::default(),
        }
    }
}

#[derive(Clone)]
pub struct BlockscoutClient {
    config: BlockscoutConfig,
    client: Arc<Client>,
}

impl std::fmt::Debug for BlockscoutClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlockscoutClient({})", self.config.base_url)
    }
}

impl BlockscoutClient {
    pub fn new(config: BlockscoutConfig) -> Result<Self, TransactionSourceError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransactionSourceError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Fetches a listing endpoint and returns its `items` array. A missing or non-array `items` is an empty listing.
    async fn fetch_items(&self, path: &str) -> Result<Vec<Value>, TransactionSourceError> {
        let url = self.url(path);
        trace!("🔗️ Sending REST query: {url}");
        let mut req = self.client.get(url);
        if !self.config.api_key.is_unset() {
            req = req.query(&[("apikey", self.config.api_key.reveal().as_str())]);
        }
        let response = req.send().await.map_err(request_error)?;
        if response.status().is_success() {
            let body = response.json::<Value>().await.map_err(|e| TransactionSourceError::InvalidResponse(e.to_string()))?;
            match body.get("items") {
                Some(Value::Array(items)) => Ok(items.clone()),
                _ => Ok(vec![]),
            }
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(request_error)?;
            Err(TransactionSourceError::QueryError { status, message })
        }
    }
}

fn request_error(e: reqwest::Error) -> TransactionSourceError {
    if e.is_timeout() {
        TransactionSourceError::Timeout
    } else {
        TransactionSourceError::RequestFailed(e.to_string())
    }
}

impl TransactionSource for BlockscoutClient {
    async fn fetch_transfers(&self, split: &EvmAddress) -> Result<Vec<ObservedTransfer>, TransactionSourceError> {
        let tx_path = format!("/addresses/{split}/transactions");
        let token_path = format!("/addresses/{split}/token-transfers");
        let (native, tokens) = tokio::try_join!(self.fetch_items(&tx_path), self.fetch_items(&token_path))?;
        let now = Utc::now().timestamp_millis();
        let mut transfers = Vec::with_capacity(native.len() + tokens.len());
        transfers.extend(native.iter().filter_map(|item| parse_native_item(item, now)));
        transfers.extend(tokens.iter().filter_map(|item| parse_token_item(item, &self.config.tokens, now)));
        debug!(
            "🔗️ Blockscout returned {} transactions and {} token transfers for {split}. {} usable",
            native.len(),
            tokens.len(),
            transfers.len()
        );
        Ok(transfers)
    }

    async fn fetch_release_event(
        &self,
        tx_hash: &TxHash,
        split: &EvmAddress,
    ) -> Result<Option<ReleaseEvent>, TransactionSourceError> {
        let logs = self.fetch_items(&format!("/transactions/{tx_hash}/logs")).await?;
        Ok(find_release_event(&logs, split))
    }
}

//--------------------------------------   Payload parsing   -------------------------------------------------------

/// Converts an integer amount in base units into whole units. Returns `None` for negative, fractional or oversized
/// values.
pub fn scale_units(raw: &str, decimals: u32) -> Option<Decimal> {
    let units = parse_decimal(raw)?.normalize();
    if units.is_sign_negative() || units.scale() != 0 {
        return None;
    }
    let mut value = units;
    value.set_scale(decimals).ok()?;
    Some(value.normalize())
}

fn address_at(item: &Value, key: &str) -> Option<EvmAddress> {
    item.get(key)?.get("hash")?.as_str()?.parse().ok()
}

fn timestamp_of(item: &Value, now: i64) -> i64 {
    item.get("timestamp")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<DateTime<Utc>>().ok())
        .map(|t| t.timestamp_millis())
        .unwrap_or(now)
}

fn block_of(item: &Value) -> u64 {
    ["block", "block_number"].iter().find_map(|k| item.get(*k).and_then(|v| v.as_u64())).unwrap_or_default()
}

fn string_or_number(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parses an entry from the `/transactions` listing. Entries without a valid hash, sender or recipient are dropped.
pub fn parse_native_item(item: &Value, now: i64) -> Option<ObservedTransfer> {
    let hash = item.get("hash").and_then(|v| v.as_str()).and_then(|s| s.parse::<TxHash>().ok());
    let (Some(hash), Some(from), Some(to)) = (hash, address_at(item, "from"), address_at(item, "to")) else {
        trace!("🔗️ Skipping malformed transaction entry: {item}");
        return None;
    };
    let raw = string_or_number(item.get("value")).unwrap_or_else(|| "0".to_string());
    let Some(value) = scale_units(&raw, NATIVE_DECIMALS) else {
        warn!("🔗️ Skipping transaction {hash} with unreadable value {raw}");
        return None;
    };
    Some(ObservedTransfer {
        hash,
        kind: TransferKind::Native,
        from,
        to,
        value,
        token: NATIVE_TOKEN.to_string(),
        timestamp: timestamp_of(item, now),
        block_number: block_of(item),
        status: item.get("status").and_then(|v| v.as_str()).unwrap_or("success").to_string(),
    })
}

/// Parses an entry from the `/token-transfers` listing. Unsupported tokens and zero-value transfers are dropped.
pub fn parse_token_item(item: &Value, tokens: &TokenRegistry, now: i64) -> Option<ObservedTransfer> {
    let token = item.get("token");
    let address = token.and_then(|t| t.get("address").or_else(|| t.get("address_hash"))).and_then(|v| v.as_str());
    let symbol = tokens.resolve(address, token.and_then(|t| t.get("symbol")).and_then(|v| v.as_str()))?;
    let hash = ["tx_hash", "transaction_hash", "hash"]
        .iter()
        .find_map(|k| item.get(*k).and_then(|v| v.as_str()))
        .and_then(|s| s.parse::<TxHash>().ok());
    let (Some(hash), Some(from), Some(to)) = (hash, address_at(item, "from"), address_at(item, "to")) else {
        trace!("🔗️ Skipping malformed token transfer entry: {item}");
        return None;
    };
    let decimals = token
        .and_then(|t| string_or_number(t.get("decimals")))
        .and_then(|d| d.parse::<u32>().ok())
        .unwrap_or(NATIVE_DECIMALS);
    let raw = string_or_number(item.get("total").and_then(|t| t.get("value"))).unwrap_or_else(|| "0".to_string());
    let value = scale_units(&raw, decimals).filter(|v| *v > Decimal::ZERO)?;
    Some(ObservedTransfer {
        hash,
        kind: TransferKind::Token,
        from,
        to,
        value,
        token: symbol,
        timestamp: timestamp_of(item, now),
        block_number: block_of(item),
        status: item.get("status").and_then(|v| v.as_str()).unwrap_or("success").to_string(),
    })
}

/// Finds the first `PaymentReleased` log emitted by `split` and decodes it.
pub fn find_release_event(logs: &[Value], split: &EvmAddress) -> Option<ReleaseEvent> {
    logs.iter()
        .filter(|log| address_at(log, "address").as_ref() == Some(split))
        .filter(|log| {
            let topic = log.get("topics").and_then(|t| t.get(0)).and_then(|t| t.as_str()).unwrap_or_default();
            topic.eq_ignore_ascii_case(PAYMENT_RELEASED_TOPIC)
        })
        .find_map(|log| {
            let data = log.get("data").and_then(|d| d.as_str()).unwrap_or_default();
            let event = decode_payment_released(data);
            if event.is_none() {
                warn!("🔗️ Could not decode PaymentReleased data: {data}");
            }
            event
        })
}

/// Decodes the ABI-encoded `(address to, uint256 amount)` payload of a `PaymentReleased` event.
pub fn decode_payment_released(data: &str) -> Option<ReleaseEvent> {
    let hex = data.strip_prefix("0x")?;
    if hex.len() < 128 || !hex.is_ascii() {
        return None;
    }
    let to = format!("0x{}", &hex[24..64]).parse::<EvmAddress>().ok()?;
    let amount = &hex[64..128];
    // uint256, but anything above 2^128 wei is not a real payment
    if amount[..32].chars().any(|c| c != '0') {
        return None;
    }
    let wei = u128::from_str_radix(&amount[32..], 16).ok()?;
    let wei = i128::try_from(wei).ok()?;
    let amount = Decimal::try_from_i128_with_scale(wei, NATIVE_DECIMALS).ok()?.normalize();
    Some(ReleaseEvent { to, amount })
}
