use recon_common::{EvmAddress, TxHash};
use thiserror::Error;

use crate::db_types::{AuditEvent, MerchantConfig, Receipt, ReceiptTxLink};

#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Stored document {0} could not be read. {1}")]
    CorruptDocument(String, String),
    #[error("Could not serialize document {0}. {1}")]
    SerializationError(String, String),
}

/// Document store for receipts and everything that hangs off them.
///
/// The store is only assumed to be atomic per document. There are no cross-document transactions, so callers that need
/// "at most once" semantics must get them from the existence of a document (see
/// [`crate::IdempotencyGuard`]).
#[allow(async_fn_in_trait)]
pub trait ReceiptRepository {
    /// Fetches the receipt with the given id from the merchant's partition. Returns `None` if it does not exist.
    async fn fetch_receipt(&self, merchant: &EvmAddress, receipt_id: &str) -> Result<Option<Receipt>, RepositoryError>;

    /// Fetches all the merchant's receipts whose `createdAt` lies in `[from, to]` (epoch ms, inclusive). Receipts that
    /// cannot be parsed are skipped.
    async fn fetch_receipts_created_between(
        &self,
        merchant: &EvmAddress,
        from: i64,
        to: i64,
    ) -> Result<Vec<Receipt>, RepositoryError>;

    /// Fetches the receipt (if any) in the merchant's partition whose `transactionHash` is `tx_hash`.
    async fn fetch_receipt_for_transaction(
        &self,
        merchant: &EvmAddress,
        tx_hash: &TxHash,
    ) -> Result<Option<Receipt>, RepositoryError>;

    /// Creates or replaces the receipt document in the merchant's partition.
    async fn upsert_receipt(&self, merchant: &EvmAddress, receipt: &Receipt) -> Result<(), RepositoryError>;

    /// Fetches the link document for the given receipt id.
    async fn fetch_link(&self, receipt_id: &str) -> Result<Option<ReceiptTxLink>, RepositoryError>;

    async fn upsert_link(&self, link: &ReceiptTxLink) -> Result<(), RepositoryError>;

    async fn fetch_merchant_config(&self, merchant: &EvmAddress) -> Result<Option<MerchantConfig>, RepositoryError>;

    async fn upsert_merchant_config(
        &self,
        merchant: &EvmAddress,
        config: &MerchantConfig,
    ) -> Result<(), RepositoryError>;

    /// Appends an audit record to the merchant's partition.
    async fn record_audit_event(&self, event: &AuditEvent) -> Result<(), RepositoryError>;
}
