//! Classification of split-contract traffic.
//!
//! | Kind   | Condition                                                 | Type      | Release type       |
//! |--------|-----------------------------------------------------------|-----------|--------------------|
//! | Native | `to == split`, sender is neither merchant nor platform    | `payment` |                    |
//! | Native | `to == split`, sender is merchant or platform (release()) | `release` | from the sender    |
//! | Token  | `to == split`, sender is neither merchant nor platform    | `payment` |                    |
//! | Token  | `from == split`                                           | `release` | from the recipient |
//! | any    | anything else                                             | `unknown` |                    |
use std::collections::HashMap;

use recon_common::{EvmAddress, TxHash};

use crate::chain_types::{ObservedTransfer, RelatedTransfer, ReleaseType, Transaction, TransferKind, TxType};

/// The parties a transfer is classified against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationContext {
    pub split: EvmAddress,
    pub merchant: Option<EvmAddress>,
    pub platform: Option<EvmAddress>,
}

impl ClassificationContext {
    pub fn new(split: EvmAddress, merchant: Option<EvmAddress>, platform: Option<EvmAddress>) -> Self {
        Self { split, merchant, platform }
    }

    fn is_merchant(&self, address: &EvmAddress) -> bool {
        self.merchant.as_ref() == Some(address)
    }

    fn is_platform(&self, address: &EvmAddress) -> bool {
        self.platform.as_ref() == Some(address)
    }

    fn release_type_for(&self, address: &EvmAddress) -> Option<ReleaseType> {
        if self.is_merchant(address) {
            Some(ReleaseType::Merchant)
        } else if self.is_platform(address) {
            Some(ReleaseType::Platform)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub tx_type: TxType,
    pub release_type: Option<ReleaseType>,
    pub release_to: Option<EvmAddress>,
}

impl Classification {
    fn unknown() -> Self {
        Self { tx_type: TxType::Unknown, release_type: None, release_to: None }
    }
}

pub fn classify(transfer: &ObservedTransfer, ctx: &ClassificationContext) -> Classification {
    let to_split = transfer.to == ctx.split;
    let from_party = ctx.release_type_for(&transfer.from);
    match transfer.kind {
        TransferKind::Native if to_split && from_party.is_none() => {
            Classification { tx_type: TxType::Payment, release_type: None, release_to: None }
        },
        // A merchant or platform calling release() on the contract
        TransferKind::Native if to_split => {
            Classification { tx_type: TxType::Release, release_type: from_party, release_to: None }
        },
        TransferKind::Token if to_split && from_party.is_none() => {
            Classification { tx_type: TxType::Payment, release_type: None, release_to: None }
        },
        TransferKind::Token if transfer.from == ctx.split => Classification {
            tx_type: TxType::Release,
            release_type: ctx.release_type_for(&transfer.to),
            release_to: Some(transfer.to.clone()),
        },
        _ => Classification::unknown(),
    }
}

/// Groups token transfers by hash, so that native transactions can carry the token legs that share their hash.
pub fn related_transfers(transfers: &[ObservedTransfer]) -> HashMap<TxHash, Vec<RelatedTransfer>> {
    transfers.iter().filter(|t| t.kind == TransferKind::Token).fold(HashMap::new(), |mut map, t| {
        map.entry(t.hash.clone()).or_insert_with(Vec::new).push(RelatedTransfer {
            symbol: t.token.clone(),
            value: t.value,
            to: t.to.clone(),
            from: t.from.clone(),
        });
        map
    })
}

/// Builds the classified transaction for a transfer.
pub fn to_transaction(
    transfer: ObservedTransfer,
    ctx: &ClassificationContext,
    related: &HashMap<TxHash, Vec<RelatedTransfer>>,
) -> Transaction {
    let Classification { tx_type, release_type, release_to } = classify(&transfer, ctx);
    let related_tokens = match transfer.kind {
        TransferKind::Native => related.get(&transfer.hash).cloned().unwrap_or_default(),
        TransferKind::Token => vec![],
    };
    Transaction {
        hash: transfer.hash,
        from: transfer.from,
        to: transfer.to,
        value: transfer.value,
        token: transfer.token,
        timestamp: transfer.timestamp,
        block_number: transfer.block_number,
        status: transfer.status,
        tx_type,
        release_type,
        release_to,
        related_tokens,
    }
}
