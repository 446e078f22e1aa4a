//! Split Payment Reconciliation Engine
//!
//! Merchants are paid through a split contract that forwards funds to the merchant and the platform. Payments arrive
//! on-chain with no reference to the order that prompted them, so this library matches them to the merchant's
//! off-chain receipts and marks those receipts as reconciled.
//!
//! The library is divided into the following sections:
//! 1. Data types. Receipts and the other documents in the store are defined in [`mod@db_types`]; on-chain transfers
//!    and classified transactions in [`mod@chain_types`].
//! 2. Backends. The engine is backend-agnostic. The [`mod@traits`] module defines what a receipt store, a transaction
//!    source and a rate oracle must provide. SQLite, Blockscout and Coinbase implementations are provided.
//! 3. Matching. [`mod@ledger`] classifies split-contract traffic, and [`mod@matcher`] decides which receipt a payment
//!    settles.
//! 4. The public API ([`ReconciliationApi`] and [`TransactionsApi`]).
//!
//! Every successful reconciliation emits a [`events::ReceiptReconciledEvent`] that can be subscribed to via
//! [`events::EventHooks`].
mod db;

pub mod chain_types;
pub mod db_types;
pub mod events;
pub mod integrations;
pub mod ledger;
pub mod matcher;
mod recon_api;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{db::SqliteDatabase, SqliteDatabaseError};
pub use integrations::{
    blockscout::{BlockscoutClient, BlockscoutConfig, TokenRegistry},
    coinbase::CoinbaseRateOracle,
    memory::{MemoryTransactionSource, StaticRateOracle},
};
pub use recon_api::{
    errors::{ReconcileError, TransactionsApiError},
    idempotency::{Claim, ClaimOutcome, IdempotencyGuard},
    recon_objects,
    reconciliation_api::ReconciliationApi,
    transactions_api::{TransactionHistory, TransactionsApi},
};
