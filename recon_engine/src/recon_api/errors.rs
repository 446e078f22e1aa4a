use thiserror::Error;

use crate::traits::TransactionSourceError;

#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error("'{0}' is not a valid merchant wallet address")]
    InvalidMerchantWallet(String),
    #[error("'{0}' is not a valid split contract address")]
    InvalidSplitAddress(String),
    #[error("No split contract address was supplied, and none is configured for the merchant")]
    SplitRequired,
    #[error("Could not fetch the split contract transactions. {0}")]
    FailedToFetchTransactions(String),
    #[error("Reconciliation failed. {0}")]
    ReconcileFailed(String),
}

impl ReconcileError {
    /// The stable error code reported to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            ReconcileError::InvalidMerchantWallet(_) => "invalid_merchant_wallet",
            ReconcileError::InvalidSplitAddress(_) => "invalid_split_address",
            ReconcileError::SplitRequired => "split_required",
            ReconcileError::FailedToFetchTransactions(_) => "failed_to_fetch_transactions",
            ReconcileError::ReconcileFailed(_) => "reconcile_failed",
        }
    }

    /// True for errors caused by the request rather than by the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ReconcileError::InvalidMerchantWallet(_) | ReconcileError::InvalidSplitAddress(_) | ReconcileError::SplitRequired
        )
    }
}

#[derive(Debug, Clone, Error)]
pub enum TransactionsApiError {
    #[error("{0}")]
    SourceError(#[from] TransactionSourceError),
    #[error("The transaction source did not respond within {0}s")]
    Timeout(u64),
}

impl TransactionsApiError {
    pub fn code(&self) -> &'static str {
        "failed_to_fetch_transactions"
    }
}

impl From<TransactionsApiError> for ReconcileError {
    fn from(e: TransactionsApiError) -> Self {
        ReconcileError::FailedToFetchTransactions(e.to_string())
    }
}
