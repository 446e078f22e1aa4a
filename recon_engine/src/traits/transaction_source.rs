use recon_common::{EvmAddress, TxHash};
use thiserror::Error;

use crate::chain_types::{ObservedTransfer, ReleaseEvent};

#[derive(Debug, Clone, Error)]
pub enum TransactionSourceError {
    #[error("Could not initialize the transaction source. {0}")]
    Initialization(String),
    #[error("The request to the indexer failed. {0}")]
    RequestFailed(String),
    #[error("The indexer returned an error. Status {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The indexer response could not be read. {0}")]
    InvalidResponse(String),
    #[error("The indexer did not respond in time")]
    Timeout,
}

/// A read-only view of the on-chain traffic touching a split contract.
///
/// Implementations must validate payloads at the boundary: entries with malformed hashes, addresses or amounts,
/// unsupported tokens, and zero-value token transfers are dropped rather than returned.
#[allow(async_fn_in_trait)]
pub trait TransactionSource {
    /// All native transactions and token transfers that have the split contract as sender or recipient.
    async fn fetch_transfers(&self, split: &EvmAddress) -> Result<Vec<ObservedTransfer>, TransactionSourceError>;

    /// Fetches the `PaymentReleased` event emitted by `split` in the given transaction, if there is one.
    async fn fetch_release_event(
        &self,
        _tx_hash: &TxHash,
        _split: &EvmAddress,
    ) -> Result<Option<ReleaseEvent>, TransactionSourceError> {
        Ok(None)
    }
}
