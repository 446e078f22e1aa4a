use cucumber::World;
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use recon_common::{EvmAddress, TxHash};
use recon_engine::{
    chain_types::ObservedTransfer,
    recon_objects::{ReconcileResult, ReconcileRequest},
    MemoryTransactionSource,
    ReconcileError,
    ReconciliationApi,
    SqliteDatabase,
    StaticRateOracle,
    TransactionsApi,
};

use crate::support::prepare_env::prepare_test_env;

pub const MERCHANT: &str = "0x1111111111111111111111111111111111111111";
pub const SPLIT: &str = "0x5555555555555555555555555555555555555555";
/// Scenario clock origin. Step timestamps are given in minutes after this instant.
pub const EPOCH: i64 = 1_700_000_000_000;

#[derive(Default, Debug, World)]
pub struct ReconWorld {
    pub system: Option<ReconSystem>,
}

#[derive(Debug)]
pub struct ReconSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub transfers: Vec<ObservedTransfer>,
    pub oracle: StaticRateOracle,
    pub last_result: Option<Result<ReconcileResult, ReconcileError>>,
}

impl ReconWorld {
    pub fn system(&mut self) -> &mut ReconSystem {
        self.system.as_mut().expect("Reconciliation system not initialised")
    }
}

impl ReconSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 1).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        Self { db_path: url, db, transfers: vec![], oracle: StaticRateOracle::default(), last_result: None }
    }

    /// A reconciliation API over the transfers recorded so far.
    pub fn api(&self) -> ReconciliationApi<SqliteDatabase, MemoryTransactionSource, StaticRateOracle> {
        let ledger = TransactionsApi::new(MemoryTransactionSource::new(self.transfers.clone()), None);
        ReconciliationApi::new(self.db.clone(), ledger, self.oracle.clone())
    }

    pub async fn run(&mut self, request: ReconcileRequest) {
        let result = self.api().reconcile(request).await;
        self.last_result = Some(result);
    }

    /// Closes the database and removes it. The database of a failed scenario is kept for inspection.
    pub async fn teardown(self, passed: bool) {
        self.db.close().await;
        if !passed {
            error!("🚀️ Scenario failed. Database retained at {}", self.db_path);
            return;
        }
        debug!("🚀️ Scenario passed. Removing {}", self.db_path);
        if let Err(e) = Sqlite::drop_database(&self.db_path).await {
            warn!("🚀️ Could not remove database {}: {e}", self.db_path);
        }
    }

    pub fn result(&self) -> &ReconcileResult {
        match &self.last_result {
            Some(Ok(result)) => result,
            Some(Err(e)) => panic!("Reconciliation failed: {e}"),
            None => panic!("No reconciliation has been run"),
        }
    }
}

pub fn merchant() -> EvmAddress {
    MERCHANT.parse().expect("Invalid merchant address")
}

pub fn split() -> EvmAddress {
    SPLIT.parse().expect("Invalid split address")
}

/// `a` -> `0xaaaa...` (64 hex digits)
pub fn tx_hash(alias: &str) -> TxHash {
    format!("0x{}", alias.to_lowercase().repeat(64 / alias.len().max(1)))
        .parse()
        .expect("Payment aliases must be 1, 2 or 4 hex digits")
}

/// `b` -> `0xbbbb...` (40 hex digits)
pub fn wallet(alias: &str) -> EvmAddress {
    format!("0x{}", alias.to_lowercase().repeat(40 / alias.len().max(1)))
        .parse()
        .expect("Wallet aliases must be 1, 2, 4 or 5 hex digits")
}

pub fn at_minute(minute: i64) -> i64 {
    EPOCH + minute * 60_000
}
