//! At-most-once linking of receipts to transactions.
//!
//! The store offers no cross-document transactions, so the guard relies on the existence of the receipt's
//! `receipt_tx_link` document: once a link with a well-formed hash exists, the receipt is claimed for good. The link is
//! always the *last* document written for a reconciliation. If the receipt write fails, no link is written and the
//! receipt remains eligible for a later run.
use std::future::Future;

use log::*;
use recon_common::{EvmAddress, TxHash};

use crate::{
    db_types::{Receipt, ReceiptTxLink},
    traits::{ReceiptRepository, RepositoryError},
};

/// A request to bind `receipt_id` to `tx_hash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub receipt_id: String,
    pub tx_hash: TxHash,
    pub merchant: EvmAddress,
    pub linked_at: i64,
    pub correlation_id: Option<String>,
}

impl Claim {
    pub fn new(receipt_id: &str, tx_hash: &TxHash, merchant: &EvmAddress, linked_at: i64) -> Self {
        Self {
            receipt_id: receipt_id.to_string(),
            tx_hash: tx_hash.clone(),
            merchant: merchant.clone(),
            linked_at,
            correlation_id: None,
        }
    }

    pub fn with_correlation_id<S: Into<String>>(mut self, correlation_id: S) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    fn to_link(&self) -> ReceiptTxLink {
        ReceiptTxLink::new(
            &self.receipt_id,
            &self.tx_hash,
            &self.merchant,
            self.linked_at,
            self.correlation_id.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The claim was recorded and the commit closure ran.
    Claimed,
    /// The receipt had already been claimed for the given hash. Nothing was written.
    AlreadyClaimed(TxHash),
}

pub struct IdempotencyGuard<'a, B> {
    db: &'a B,
}

impl<'a, B> IdempotencyGuard<'a, B>
where B: ReceiptRepository
{
    pub fn new(db: &'a B) -> Self {
        Self { db }
    }

    /// The hash the receipt is already linked to, if any. Link documents without a well-formed hash are ignored.
    pub async fn existing_claim(&self, receipt_id: &str) -> Result<Option<TxHash>, RepositoryError> {
        let link = self.db.fetch_link(receipt_id).await?;
        Ok(link.and_then(|l| l.claimed_hash()))
    }

    /// Records the claim unless the receipt is already linked. Returns `true` if this call wrote the link.
    pub async fn try_claim(&self, claim: &Claim) -> Result<bool, RepositoryError> {
        let outcome = self.claim_with(claim, || async { Ok(()) }).await?;
        Ok(outcome == ClaimOutcome::Claimed)
    }

    /// Records the claim after running `commit`, unless the receipt is already linked.
    ///
    /// `commit` performs the writes that belong to the claim (typically the receipt update). If it fails, its error is
    /// returned and the link is not written.
    pub async fn claim_with<F, Fut>(&self, claim: &Claim, commit: F) -> Result<ClaimOutcome, RepositoryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), RepositoryError>>,
    {
        if let Some(existing) = self.existing_claim(&claim.receipt_id).await? {
            debug!("🔐️ Receipt {} is already linked to {existing}. Not linking it to {}", claim.receipt_id, claim.tx_hash);
            return Ok(ClaimOutcome::AlreadyClaimed(existing));
        }
        commit().await?;
        self.db.upsert_link(&claim.to_link()).await?;
        trace!("🔐️ Receipt {} is now linked to {}", claim.receipt_id, claim.tx_hash);
        Ok(ClaimOutcome::Claimed)
    }

    /// The receipt in the merchant's partition that has already been linked to `tx_hash`, if any.
    pub async fn linked_receipt_for(
        &self,
        merchant: &EvmAddress,
        tx_hash: &TxHash,
    ) -> Result<Option<Receipt>, RepositoryError> {
        self.db.fetch_receipt_for_transaction(merchant, tx_hash).await
    }
}
