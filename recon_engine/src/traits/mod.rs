//! # Backend contracts
//!
//! The reconciliation engine talks to the outside world through three traits. Concrete implementations live in
//! [`crate::db`] (SQLite receipt store) and [`crate::integrations`] (Blockscout indexer, Coinbase rates), but the
//! engine only ever sees the traits, which keeps the matching logic testable with doubles.
//!
//! * [`ReceiptRepository`] is a keyed, partitioned document store offering point reads and upserts of receipts, link
//!   documents, merchant configuration and audit events, plus the range read used to load candidate receipts.
//! * [`TransactionSource`] supplies the transfers touching a split contract address. It is a pure read.
//! * [`RateOracle`] supplies the current USD price of a token.
mod rate_oracle;
mod receipt_repository;
mod transaction_source;

pub use rate_oracle::{RateOracle, RateOracleError};
pub use receipt_repository::{ReceiptRepository, RepositoryError};
pub use transaction_source::{TransactionSource, TransactionSourceError};
