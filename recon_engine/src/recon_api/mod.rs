//! # Reconciliation engine public API
//!
//! * [`reconciliation_api`] links payments into a merchant's split contract to the merchant's open receipts.
//! * [`transactions_api`] provides the classified transaction history of a split contract, with running totals.
//! * [`idempotency`] guarantees that a receipt is linked to at most one transaction.
//!
//! The other submodules hold the request and response types, and errors.
//!
//! # API usage
//!
//! Each API is created from the backends it needs. For example:
//!
//! ```rust,ignore
//! use recon_engine::{BlockscoutClient, CoinbaseRateOracle, ReconciliationApi, SqliteDatabase, TransactionsApi};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let ledger = TransactionsApi::new(BlockscoutClient::new(config)?, platform_wallet);
//! let api = ReconciliationApi::new(db, ledger, CoinbaseRateOracle::new(rates_url, timeout)?);
//! let result = api.reconcile(request).await?;
//! ```
pub mod errors;
pub mod idempotency;
pub mod recon_objects;
pub mod reconciliation_api;
pub mod transactions_api;
