use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RateOracleError {
    #[error("No price is available for {0}")]
    PriceUnavailable(String),
    #[error("The price feed request failed. {0}")]
    RequestFailed(String),
    #[error("The price feed returned an unreadable price for {0}: {1}")]
    InvalidPrice(String, String),
}

/// A source of current token prices.
#[allow(async_fn_in_trait)]
pub trait RateOracle {
    /// The USD price of one whole unit of `symbol`.
    async fn usd_price(&self, symbol: &str) -> Result<Decimal, RateOracleError>;
}
