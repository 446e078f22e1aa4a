use std::{env, time::Duration};

use log::*;
use recon_common::{helpers::parse_boolean_flag, EvmAddress, Secret};
use recon_engine::{
    integrations::{blockscout::DEFAULT_BLOCKSCOUT_URL, coinbase::DEFAULT_RATES_URL},
    BlockscoutConfig,
    TokenRegistry,
};

const DEFAULT_RECON_HOST: &str = "127.0.0.1";
const DEFAULT_RECON_PORT: u16 = 8370;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/recon_store.db";
const DEFAULT_INDEXER_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_RATES_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_EVENT_BUFFER_SIZE: usize = 25;

/// Environment variables holding the ERC-20 contract address of each supported token.
pub(crate) static TOKEN_ADDRESS_ENVS: [(&str, &str); 5] = [
    ("USDC", "RECON_USDC_ADDRESS"),
    ("USDT", "RECON_USDT_ADDRESS"),
    ("cbBTC", "RECON_CBBTC_ADDRESS"),
    ("cbXRP", "RECON_CBXRP_ADDRESS"),
    ("SOL", "RECON_SOL_ADDRESS"),
];

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, pending database migrations are applied when the server starts.
    pub run_migrations: bool,
    pub indexer: IndexerConfig,
    pub rates: RatesConfig,
    /// Releases to this wallet are classified as platform releases.
    pub platform_wallet: Option<EvmAddress>,
    /// Capacity of the queue feeding the event hooks.
    pub event_buffer_size: usize,
}

#[derive(Clone, Debug)]
pub struct IndexerConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
    pub timeout: Duration,
    pub tokens: TokenRegistry,
}

#[derive(Clone, Debug)]
pub struct RatesConfig {
    pub url: String,
    pub timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RECON_HOST.to_string(),
            port: DEFAULT_RECON_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            run_migrations: true,
            indexer: IndexerConfig::default(),
            rates: RatesConfig::default(),
            platform_wallet: None,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BLOCKSCOUT_URL.to_string(),
            api_key: Secret::default(),
            timeout: DEFAULT_INDEXER_TIMEOUT,
            tokens: TokenRegistry::default(),
        }
    }
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self { url: DEFAULT_RATES_URL.to_string(), timeout: DEFAULT_RATES_TIMEOUT }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("RECON_HOST").ok().unwrap_or_else(|| DEFAULT_RECON_HOST.into());
        let port = env::var("RECON_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for RECON_PORT. {e} Using the default, {DEFAULT_RECON_PORT}, \
                         instead."
                    );
                    DEFAULT_RECON_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_RECON_PORT);
        let database_url = env::var("RECON_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ RECON_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let run_migrations = parse_boolean_flag(env::var("RECON_RUN_MIGRATIONS").ok(), true);
        let platform_wallet = env::var("RECON_PLATFORM_WALLET").ok().and_then(|s| {
            s.parse::<EvmAddress>()
                .map_err(|e| warn!("🪛️ Ignoring RECON_PLATFORM_WALLET. {e}"))
                .ok()
        });
        if platform_wallet.is_none() {
            info!("🪛️ No platform wallet is configured. Releases to the platform will not be identified as such.");
        }
        let event_buffer_size = env::var("RECON_EVENT_BUFFER_SIZE")
            .ok()
            .and_then(|s| {
                s.parse::<usize>()
                    .map_err(|e| warn!("🪛️ {s} is not a valid RECON_EVENT_BUFFER_SIZE. {e}"))
                    .ok()
            })
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_EVENT_BUFFER_SIZE);
        Self {
            host,
            port,
            database_url,
            run_migrations,
            indexer: IndexerConfig::from_env_or_default(),
            rates: RatesConfig::from_env_or_default(),
            platform_wallet,
            event_buffer_size,
        }
    }
}

impl IndexerConfig {
    pub fn from_env_or_default() -> Self {
        let base_url = env::var("RECON_BLOCKSCOUT_URL").ok().unwrap_or_else(|| DEFAULT_BLOCKSCOUT_URL.into());
        let api_key = env::var("RECON_INDEXER_API_KEY").ok().map(Secret::new).unwrap_or_default();
        let timeout = timeout_from_env("RECON_INDEXER_TIMEOUT", DEFAULT_INDEXER_TIMEOUT);
        let tokens = TOKEN_ADDRESS_ENVS.iter().fold(TokenRegistry::default(), |tokens, (symbol, var)| {
            match env::var(var).ok().filter(|s| !s.trim().is_empty()) {
                Some(s) => match s.trim().parse::<EvmAddress>() {
                    Ok(address) => {
                        debug!("🪛️ {symbol} contract address is {address}");
                        tokens.with_token(symbol, address)
                    },
                    Err(e) => {
                        warn!("🪛️ Ignoring {var}. {e}");
                        tokens
                    },
                },
                None => {
                    debug!("🪛️ {var} is not set. {symbol} transfers will be recognised by their symbol only.");
                    tokens
                },
            }
        });
        Self { base_url, api_key, timeout, tokens }
    }

    pub fn blockscout_config(&self) -> BlockscoutConfig {
        BlockscoutConfig {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            timeout: self.timeout,
            tokens: self.tokens.clone(),
        }
    }
}

impl RatesConfig {
    pub fn from_env_or_default() -> Self {
        let url = env::var("RECON_RATES_URL").ok().unwrap_or_else(|| DEFAULT_RATES_URL.into());
        let timeout = timeout_from_env("RECON_RATES_TIMEOUT", DEFAULT_RATES_TIMEOUT);
        Self { url, timeout }
    }
}

/// Reads a timeout, in whole seconds, from `var`.
fn timeout_from_env(var: &str, default: Duration) -> Duration {
    match env::var(var) {
        Ok(s) => match s.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => {
                warn!("🪛️ {s} is not a valid value for {var}. Using the default of {}s.", default.as_secs());
                default
            },
        },
        Err(_) => default,
    }
}
