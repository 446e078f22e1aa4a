use recon_common::EvmAddress;

use crate::{chain_types::Transaction, db_types::Receipt};

/// Published after a receipt has been linked to a payment and both documents have been written.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptReconciledEvent {
    pub merchant: EvmAddress,
    /// The receipt as it was written, i.e. with status `reconciled`
    pub receipt: Receipt,
    pub transaction: Transaction,
    /// Name of the matching strategy that produced the link
    pub strategy: String,
    pub correlation_id: String,
}
