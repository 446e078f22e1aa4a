use std::{
    collections::{BTreeSet, HashMap, HashSet},
    fmt::Debug,
    time::Duration,
};

use chrono::Utc;
use log::*;
use recon_common::{EvmAddress, TxHash};
use rust_decimal::Decimal;
use tokio::time::timeout;

use crate::{
    chain_types::Transaction,
    db_types::{AuditEvent, Receipt},
    events::{EventProducers, ReceiptReconciledEvent},
    matcher::{MatchContext, MatchEngine, PriceTable},
    recon_api::{
        errors::ReconcileError,
        idempotency::{Claim, ClaimOutcome, IdempotencyGuard},
        recon_objects::{ReconcileRequest, ReconcileResult},
        transactions_api::TransactionsApi,
    },
    traits::{RateOracle, ReceiptRepository, RepositoryError, TransactionSource},
};

pub const DEFAULT_RATES_TIMEOUT: Duration = Duration::from_secs(5);

/// What happened to a single transaction during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Disposition {
    Reconciled,
    /// The transaction is already linked to a receipt. Not a failure.
    AlreadyLinked,
    /// Another writer linked the chosen receipt first.
    Lost,
    Unmatched,
}

/// `ReconciliationApi` matches payments made into a merchant's split contract against the merchant's open receipts and
/// marks the matched receipts as reconciled.
///
/// Every run is idempotent: transactions that are already linked are skipped, and a receipt is linked to at most one
/// transaction (see [`IdempotencyGuard`]).
pub struct ReconciliationApi<B, S, R> {
    db: B,
    ledger: TransactionsApi<S>,
    oracle: R,
    engine: MatchEngine,
    producers: EventProducers,
    rates_timeout: Duration,
}

impl<B, S, R> Debug for ReconciliationApi<B, S, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi({:?}, {:?})", self.ledger, self.engine)
    }
}

impl<B, S, R> ReconciliationApi<B, S, R> {
    pub fn new(db: B, ledger: TransactionsApi<S>, oracle: R) -> Self {
        Self {
            db,
            ledger,
            oracle,
            engine: MatchEngine::default(),
            producers: EventProducers::default(),
            rates_timeout: DEFAULT_RATES_TIMEOUT,
        }
    }

    pub fn with_engine(mut self, engine: MatchEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_producers(mut self, producers: EventProducers) -> Self {
        self.producers = producers;
        self
    }

    pub fn with_rates_timeout(mut self, rates_timeout: Duration) -> Self {
        self.rates_timeout = rates_timeout;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn ledger(&self) -> &TransactionsApi<S> {
        &self.ledger
    }
}

impl<B, S, R> ReconciliationApi<B, S, R>
where
    B: ReceiptRepository,
    S: TransactionSource,
    R: RateOracle,
{
    /// Runs a reconciliation for the merchant.
    ///
    /// In a targeted run (`tx_hashes` is not empty) only the listed transactions are considered, and every listed hash
    /// that is neither reconciled nor already linked is reported in `unmatched`. A scan considers every payment into
    /// the split contract and does not report `unmatched`.
    ///
    /// Failures on individual transactions do not abort the run. They are logged, and the hash is reported as
    /// unmatched.
    pub async fn reconcile(&self, request: ReconcileRequest) -> Result<ReconcileResult, ReconcileError> {
        let cid = request.correlation_id.as_str();
        let merchant = &request.merchant;
        let split = self.resolve_split(&request).await?;
        info!("🧾️ [{cid}] Reconciling payments into {split} for merchant {merchant}");
        let history = self.ledger.fetch_history(&split, Some(merchant)).await.map_err(|e| {
            warn!("🧾️ [{cid}] Could not fetch transactions for {split}. {e}");
            ReconcileError::from(e)
        })?;
        let payments = dedup_payments(history.transactions);
        let work: Vec<(TxHash, Option<Transaction>)> = if request.is_targeted() {
            request.tx_hashes.iter().map(|h| (h.clone(), payments.iter().find(|t| &t.hash == h).cloned())).collect()
        } else {
            payments.into_iter().map(|t| (t.hash.clone(), Some(t))).collect()
        };
        let txs = work.iter().filter_map(|(_, t)| t.as_ref()).collect::<Vec<_>>();
        let prices = self.resolve_prices(&txs, cid).await;
        let now = Utc::now().timestamp_millis();
        let ctx = MatchContext::new(request.options.time_window_ms, request.options.tolerance_pct, prices, now);
        let mut candidates = self.load_candidates(&request, &txs).await?;
        debug!("🧾️ [{cid}] {} transactions to consider against {} candidate receipts", work.len(), candidates.len());

        let mut linked = HashSet::new();
        let mut reconciled = 0usize;
        let mut unmatched = Vec::new();
        for (hash, tx) in work {
            let Some(tx) = tx else {
                debug!("🧾️ [{cid}] {hash} is not a payment into {split}");
                unmatched.push(hash);
                continue;
            };
            match self.process_transaction(&tx, merchant, &mut candidates, &mut linked, &ctx, cid).await {
                Ok(Disposition::Reconciled) => reconciled += 1,
                Ok(Disposition::AlreadyLinked) | Ok(Disposition::Lost) => {},
                Ok(Disposition::Unmatched) => unmatched.push(hash),
                Err(e) => {
                    error!("🧾️ [{cid}] Could not reconcile {hash}. {e}");
                    unmatched.push(hash);
                },
            }
        }
        info!("🧾️ [{cid}] Reconciliation complete. {reconciled} receipts reconciled, {} unmatched", unmatched.len());
        let unmatched = request.is_targeted().then_some(unmatched);
        Ok(ReconcileResult { reconciled, unmatched })
    }

    /// The split address from the request, falling back on the merchant's configuration.
    async fn resolve_split(&self, request: &ReconcileRequest) -> Result<EvmAddress, ReconcileError> {
        if let Some(split) = &request.split {
            return Ok(split.clone());
        }
        match self.db.fetch_merchant_config(&request.merchant).await {
            Ok(config) => config.and_then(|c| c.split_address()).ok_or(ReconcileError::SplitRequired),
            Err(e) => {
                warn!("🧾️ [{}] Could not read the site config for {}. {e}", request.correlation_id, request.merchant);
                Err(ReconcileError::SplitRequired)
            },
        }
    }

    /// Live prices for every token in `txs`. Tokens whose price cannot be fetched keep their fallback price.
    async fn resolve_prices(&self, txs: &[&Transaction], cid: &str) -> PriceTable {
        let mut prices = PriceTable::with_fallbacks();
        let symbols = txs.iter().map(|t| t.token.to_uppercase()).collect::<BTreeSet<_>>();
        for symbol in symbols {
            match timeout(self.rates_timeout, self.oracle.usd_price(&symbol)).await {
                Ok(Ok(price)) if price > Decimal::ZERO => {
                    trace!("🧾️ [{cid}] {symbol} = ${price}");
                    prices.set_price(&symbol, price);
                },
                Ok(Ok(price)) => warn!("🧾️ [{cid}] Ignoring non-positive price {price} for {symbol}"),
                Ok(Err(e)) => warn!("🧾️ [{cid}] Using the fallback price for {symbol}. {e}"),
                Err(_) => warn!("🧾️ [{cid}] Price lookup for {symbol} timed out. Using the fallback price"),
            }
        }
        prices
    }

    /// The receipts that may be matched in this run: the pinned receipt if one was given, otherwise every eligible
    /// receipt created within a window of the transactions' timestamps.
    async fn load_candidates(
        &self,
        request: &ReconcileRequest,
        txs: &[&Transaction],
    ) -> Result<Vec<Receipt>, ReconcileError> {
        let failed =
            |e: RepositoryError| ReconcileError::ReconcileFailed(format!("Could not load candidate receipts. {e}"));
        if let Some(receipt_id) = &request.receipt_id {
            let receipt = self.db.fetch_receipt(&request.merchant, receipt_id).await.map_err(failed)?;
            return Ok(receipt.into_iter().filter(|r| r.is_eligible()).collect());
        }
        let (Some(min), Some(max)) = (txs.iter().map(|t| t.timestamp).min(), txs.iter().map(|t| t.timestamp).max())
        else {
            return Ok(vec![]);
        };
        let window = request.options.time_window_ms;
        let receipts = self
            .db
            .fetch_receipts_created_between(&request.merchant, min.saturating_sub(window), max.saturating_add(window))
            .await
            .map_err(failed)?;
        Ok(receipts.into_iter().filter(|r| r.is_eligible()).collect())
    }

    async fn process_transaction(
        &self,
        tx: &Transaction,
        merchant: &EvmAddress,
        candidates: &mut Vec<Receipt>,
        linked: &mut HashSet<TxHash>,
        ctx: &MatchContext,
        cid: &str,
    ) -> Result<Disposition, ReconcileError> {
        let failed = |e: RepositoryError| ReconcileError::ReconcileFailed(e.to_string());
        if linked.contains(&tx.hash) {
            return Ok(Disposition::AlreadyLinked);
        }
        let guard = IdempotencyGuard::new(&self.db);
        if let Some(receipt) = guard.linked_receipt_for(merchant, &tx.hash).await.map_err(failed)? {
            debug!("🧾️ [{cid}] {} is already linked to receipt {}", tx.hash, receipt.receipt_id);
            linked.insert(tx.hash.clone());
            return Ok(Disposition::AlreadyLinked);
        }
        let Some(m) = self.engine.find_match(tx, candidates, ctx) else {
            debug!("🧾️ [{cid}] No receipt matches {} ({} {})", tx.hash, tx.value, tx.token);
            return Ok(Disposition::Unmatched);
        };
        let receipt_id = candidates[m.index].receipt_id.clone();
        debug!("🧾️ [{cid}] {} matches receipt {receipt_id} by {} (score {})", tx.hash, m.strategy, m.score);
        // Candidates are a snapshot. Re-read the receipt in case another run has linked it in the meantime.
        let fresh = self.db.fetch_receipt(merchant, &receipt_id).await.map_err(failed)?;
        let Some(fresh) = fresh.filter(|r| r.is_eligible()) else {
            debug!("🧾️ [{cid}] Receipt {receipt_id} is no longer open. Skipping {}", tx.hash);
            candidates.remove(m.index);
            return Ok(Disposition::Lost);
        };
        let now = Utc::now().timestamp_millis();
        let updated = fresh.reconciled_with(tx, now);
        let claim = Claim::new(&receipt_id, &tx.hash, merchant, now).with_correlation_id(cid);
        let outcome = guard.claim_with(&claim, || self.db.upsert_receipt(merchant, &updated)).await.map_err(failed)?;
        candidates.remove(m.index);
        match outcome {
            ClaimOutcome::AlreadyClaimed(other) => {
                info!("🧾️ [{cid}] Receipt {receipt_id} was claimed by {other} first. {} stays unlinked", tx.hash);
                Ok(Disposition::Lost)
            },
            ClaimOutcome::Claimed => {
                linked.insert(tx.hash.clone());
                info!("🧾️ [{cid}] Receipt {receipt_id} reconciled with {} ({} {})", tx.hash, tx.value, tx.token);
                self.record_audit(&updated, merchant, cid, now).await;
                self.call_receipt_reconciled_hook(merchant, &updated, tx, m.strategy, cid).await;
                Ok(Disposition::Reconciled)
            },
        }
    }

    async fn record_audit(&self, receipt: &Receipt, merchant: &EvmAddress, cid: &str, now: i64) {
        let event = AuditEvent::receipt_reconciled(receipt, merchant, cid, now);
        if let Err(e) = self.db.record_audit_event(&event).await {
            warn!("🧾️ [{cid}] Could not write the audit record for receipt {}. {e}", receipt.receipt_id);
        }
    }

    async fn call_receipt_reconciled_hook(
        &self,
        merchant: &EvmAddress,
        receipt: &Receipt,
        tx: &Transaction,
        strategy: &str,
        cid: &str,
    ) {
        if self.producers.receipt_reconciled_producer.is_empty() {
            return;
        }
        debug!("🧾️ [{cid}] Notifying receipt reconciled hook subscribers");
        let event = ReceiptReconciledEvent {
            merchant: merchant.clone(),
            receipt: receipt.clone(),
            transaction: tx.clone(),
            strategy: strategy.to_string(),
            correlation_id: cid.to_string(),
        };
        self.producers.publish_receipt_reconciled(event).await;
    }
}

/// The payments in `transactions`, one per hash, in their original order. Where an indexer reports the same hash
/// twice, the first entry with a positive value takes the place of a zero-valued one.
fn dedup_payments(transactions: Vec<Transaction>) -> Vec<Transaction> {
    let mut positions: HashMap<TxHash, usize> = HashMap::new();
    let mut payments: Vec<Transaction> = Vec::new();
    for tx in transactions.into_iter().filter(|t| t.is_payment()) {
        match positions.get(&tx.hash) {
            Some(&i) => {
                if payments[i].value <= Decimal::ZERO && tx.value > Decimal::ZERO {
                    payments[i] = tx;
                }
            },
            None => {
                positions.insert(tx.hash.clone(), payments.len());
                payments.push(tx);
            },
        }
    }
    payments
}
