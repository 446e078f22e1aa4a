use std::{sync::Arc, time::Duration};

use log::*;
use recon_common::amounts::decimal_from_value;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::traits::{RateOracle, RateOracleError};

pub const DEFAULT_RATES_URL: &str = "https://api.coinbase.com/v2/exchange-rates";

/// Spot prices from Coinbase's public exchange-rates endpoint.
#[derive(Clone)]
pub struct CoinbaseRateOracle {
    base_url: String,
    client: Arc<Client>,
}

impl std::fmt::Debug for CoinbaseRateOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CoinbaseRateOracle({})", self.base_url)
    }
}

impl CoinbaseRateOracle {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RateOracleError> {
        let client =
            Client::builder().timeout(timeout).build().map_err(|e| RateOracleError::RequestFailed(e.to_string()))?;
        Ok(Self { base_url: base_url.to_string(), client: Arc::new(client) })
    }
}

/// The Coinbase ticker for a token symbol. Wrapped Coinbase assets are priced as their underlying asset.
pub fn ticker_for(symbol: &str) -> String {
    let symbol = symbol.to_uppercase();
    match symbol.as_str() {
        "CBBTC" => "BTC".to_string(),
        "CBXRP" => "XRP".to_string(),
        _ => symbol,
    }
}

/// Extracts `data.rates.USD` from an exchange-rates response.
pub fn usd_rate_from_response(symbol: &str, body: &Value) -> Result<Decimal, RateOracleError> {
    let rate = body.pointer("/data/rates/USD").ok_or_else(|| RateOracleError::PriceUnavailable(symbol.to_string()))?;
    decimal_from_value(rate)
        .filter(|p| *p > Decimal::ZERO)
        .ok_or_else(|| RateOracleError::InvalidPrice(symbol.to_string(), rate.to_string()))
}

impl RateOracle for CoinbaseRateOracle {
    async fn usd_price(&self, symbol: &str) -> Result<Decimal, RateOracleError> {
        let ticker = ticker_for(symbol);
        trace!("💱️ Fetching the USD rate for {ticker}");
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("currency", ticker.as_str())])
            .send()
            .await
            .map_err(|e| RateOracleError::RequestFailed(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(RateOracleError::RequestFailed(format!("Price feed returned {status} for {ticker}")));
        }
        let body = response.json::<Value>().await.map_err(|e| RateOracleError::RequestFailed(e.to_string()))?;
        let price = usd_rate_from_response(symbol, &body)?;
        debug!("💱️ 1 {symbol} = ${price}");
        Ok(price)
    }
}
