use actix_web::{http::StatusCode, web, web::ServiceConfig};
use recon_engine::{
    db_types::{MerchantConfig, Receipt},
    traits::{RepositoryError, TransactionSourceError},
    ReconciliationApi,
    TransactionsApi,
};
use rust_decimal_macros::dec;

use super::{
    helpers::{
        address,
        now,
        post_request,
        post_request_with_correlation_id,
        token_transfer,
        tx_hash,
        BUYER,
        MERCHANT,
        SPLIT,
    },
    mocks::{MockIndexer, MockRates, MockReceiptStore},
};
use crate::routes::ReconcileRoute;

const HOUR: i64 = 3_600_000;

fn register(cfg: &mut ServiceConfig, db: MockReceiptStore, indexer: MockIndexer, rates: MockRates) {
    let api = ReconciliationApi::new(db, TransactionsApi::new(indexer, None), rates);
    cfg.service(ReconcileRoute::<MockReceiptStore, MockIndexer, MockRates>::new()).app_data(web::Data::new(api));
}

fn body(extra: serde_json::Value) -> String {
    let mut json = serde_json::json!({ "merchantWallet": MERCHANT, "splitAddress": SPLIT });
    if let (Some(base), serde_json::Value::Object(extra)) = (json.as_object_mut(), extra) {
        base.extend(extra);
    }
    json.to_string()
}

#[actix_web::test]
async fn invalid_merchant_wallet() {
    let _ = env_logger::try_init().ok();
    let res = post_request("/reconcile", r#"{"merchantWallet":"0x1234"}"#, configure_untouched).await.unwrap();
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json(), serde_json::json!({ "ok": false, "error": "invalid_merchant_wallet" }));
    assert!(res.correlation_id.is_some());
}

#[actix_web::test]
async fn unreadable_body_is_an_invalid_merchant_wallet() {
    let _ = env_logger::try_init().ok();
    let res = post_request("/reconcile", "merchant=0x11", configure_untouched).await.unwrap();
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["error"], "invalid_merchant_wallet");
}

fn configure_untouched(cfg: &mut ServiceConfig) {
    register(cfg, MockReceiptStore::new(), MockIndexer::new(), MockRates::new());
}

#[actix_web::test]
async fn split_is_required() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "merchantWallet": MERCHANT, "splitAddress": "0xnot-a-split" }).to_string();
    let res = post_request("/reconcile", &body, configure_no_site_config).await.unwrap();
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json(), serde_json::json!({ "ok": false, "error": "split_required" }));
}

fn configure_no_site_config(cfg: &mut ServiceConfig) {
    let mut db = MockReceiptStore::new();
    db.expect_fetch_merchant_config().times(1).returning(|_| Ok(None));
    register(cfg, db, MockIndexer::new(), MockRates::new());
}

#[actix_web::test]
async fn split_from_site_config() {
    let _ = env_logger::try_init().ok();
    let hash = tx_hash('c').to_string();
    let body = serde_json::json!({ "merchantWallet": MERCHANT, "txHashes": [hash] }).to_string();
    let res = post_request("/reconcile", &body, configure_site_config).await.unwrap();
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json(), serde_json::json!({ "ok": true, "reconciled": 0, "unmatched": [hash] }));
}

fn configure_site_config(cfg: &mut ServiceConfig) {
    let mut db = MockReceiptStore::new();
    db.expect_fetch_merchant_config()
        .times(1)
        .returning(|_| Ok(Some(MerchantConfig::with_split_address(&address(SPLIT)))));
    let mut indexer = MockIndexer::new();
    indexer.expect_fetch_transfers().withf(|split| split.as_str() == SPLIT).times(1).returning(|_| Ok(vec![]));
    register(cfg, db, indexer, MockRates::new());
}

#[actix_web::test]
async fn indexer_failure() {
    let _ = env_logger::try_init().ok();
    let res = post_request("/reconcile", &body(serde_json::json!({})), configure_indexer_down).await.unwrap();
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.json(), serde_json::json!({ "ok": false, "error": "failed_to_fetch_transactions" }));
}

fn configure_indexer_down(cfg: &mut ServiceConfig) {
    let mut indexer = MockIndexer::new();
    indexer
        .expect_fetch_transfers()
        .returning(|_| Err(TransactionSourceError::QueryError { status: 502, message: "Bad gateway".into() }));
    register(cfg, MockReceiptStore::new(), indexer, MockRates::new());
}

#[actix_web::test]
async fn unknown_hash_is_unmatched() {
    let _ = env_logger::try_init().ok();
    let hash = tx_hash('d').to_string();
    let res = post_request("/reconcile", &body(serde_json::json!({ "txHashes": [hash] })), configure_no_payments)
        .await
        .unwrap();
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json(), serde_json::json!({ "ok": true, "reconciled": 0, "unmatched": [hash] }));
}

#[actix_web::test]
async fn scan_without_payments() {
    let _ = env_logger::try_init().ok();
    let res = post_request("/reconcile", &body(serde_json::json!({})), configure_no_payments).await.unwrap();
    assert_eq!(res.status, StatusCode::OK);
    // Scans do not report unmatched hashes
    assert_eq!(res.json(), serde_json::json!({ "ok": true, "reconciled": 0 }));
}

#[actix_web::test]
async fn mistyped_receipt_id_is_ignored() {
    let _ = env_logger::try_init().ok();
    let res = post_request("/reconcile", &body(serde_json::json!({ "receiptId": 42 })), configure_no_payments)
        .await
        .unwrap();
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json(), serde_json::json!({ "ok": true, "reconciled": 0 }));
}

fn configure_no_payments(cfg: &mut ServiceConfig) {
    let mut indexer = MockIndexer::new();
    indexer.expect_fetch_transfers().returning(|_| Ok(vec![]));
    register(cfg, MockReceiptStore::new(), indexer, MockRates::new());
}

#[actix_web::test]
async fn usdc_payment_settles_receipt() {
    let _ = env_logger::try_init().ok();
    let hash = tx_hash('a').to_string();
    let res = post_request_with_correlation_id(
        "/reconcile",
        &body(serde_json::json!({ "txHashes": [hash] })),
        "corr-usdc",
        configure_usdc_payment,
    )
    .await
    .unwrap();
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.correlation_id.as_deref(), Some("corr-usdc"));
    assert_eq!(res.json(), serde_json::json!({ "ok": true, "reconciled": 1, "unmatched": [] }));
}

fn configure_usdc_payment(cfg: &mut ServiceConfig) {
    let created_at = now() - HOUR;
    let receipt = Receipt::new("R1", &address(MERCHANT), created_at).with_expected_token("USDC", dec!(50));
    let mut indexer = MockIndexer::new();
    indexer
        .expect_fetch_transfers()
        .returning(move |_| Ok(vec![token_transfer('a', BUYER, SPLIT, "USDC", dec!(50.1), created_at + 60_000)]));
    let mut rates = MockRates::new();
    rates.expect_usd_price().returning(|_| Ok(dec!(1)));
    let mut db = MockReceiptStore::new();
    let candidates = vec![receipt.clone()];
    db.expect_fetch_receipts_created_between().times(1).returning(move |_, _, _| Ok(candidates.clone()));
    db.expect_fetch_receipt_for_transaction().times(1).returning(|_, _| Ok(None));
    db.expect_fetch_receipt().withf(|_, id| id == "R1").times(1).returning(move |_, _| Ok(Some(receipt.clone())));
    db.expect_fetch_link().times(1).returning(|_| Ok(None));
    db.expect_upsert_receipt()
        .withf(|_, r| {
            r.receipt_id == "R1" &&
                r.status.as_ref().map(|s| s.as_str()) == Some("reconciled") &&
                r.transaction_hash == Some(tx_hash('a').to_string()) &&
                r.buyer_wallet.as_deref() == Some(BUYER)
        })
        .times(1)
        .returning(|_, _| Ok(()));
    db.expect_upsert_link()
        .withf(|link| {
            link.id == "receipt_tx_link:R1" &&
                link.tx_hash == Some(tx_hash('a').to_string()) &&
                link.correlation_id.as_deref() == Some("corr-usdc")
        })
        .times(1)
        .returning(|_| Ok(()));
    db.expect_record_audit_event().times(1).returning(|_| Ok(()));
    register(cfg, db, indexer, rates);
}

#[actix_web::test]
async fn already_linked_receipt_is_not_relinked() {
    let _ = env_logger::try_init().ok();
    let hash = tx_hash('a').to_string();
    let res = post_request("/reconcile", &body(serde_json::json!({ "txHashes": [hash] })), configure_already_linked)
        .await
        .unwrap();
    assert_eq!(res.status, StatusCode::OK);
    // The transaction is already accounted for, so it is neither reconciled again nor reported as unmatched
    assert_eq!(res.json(), serde_json::json!({ "ok": true, "reconciled": 0, "unmatched": [] }));
}

fn configure_already_linked(cfg: &mut ServiceConfig) {
    let created_at = now() - HOUR;
    let linked = Receipt::new("R1", &address(MERCHANT), created_at).with_expected_token("USDC", dec!(50));
    let mut indexer = MockIndexer::new();
    indexer
        .expect_fetch_transfers()
        .returning(move |_| Ok(vec![token_transfer('a', BUYER, SPLIT, "USDC", dec!(50), created_at + 60_000)]));
    let mut rates = MockRates::new();
    rates.expect_usd_price().returning(|_| Ok(dec!(1)));
    let mut db = MockReceiptStore::new();
    db.expect_fetch_receipts_created_between().returning(|_, _, _| Ok(vec![]));
    db.expect_fetch_receipt_for_transaction().times(1).returning(move |_, _| Ok(Some(linked.clone())));
    db.expect_upsert_receipt().never();
    db.expect_upsert_link().never();
    register(cfg, db, indexer, rates);
}

#[actix_web::test]
async fn failed_write_leaves_the_hash_unmatched() {
    let _ = env_logger::try_init().ok();
    let first = tx_hash('a').to_string();
    let second = tx_hash('b').to_string();
    let res = post_request(
        "/reconcile",
        &body(serde_json::json!({ "txHashes": [first, second] })),
        configure_first_write_fails,
    )
    .await
    .unwrap();
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json(), serde_json::json!({ "ok": true, "reconciled": 1, "unmatched": [first] }));
}

fn configure_first_write_fails(cfg: &mut ServiceConfig) {
    let created_at = now() - HOUR;
    let r1 = Receipt::new("R1", &address(MERCHANT), created_at).with_expected_token("USDC", dec!(50));
    let r2 = Receipt::new("R2", &address(MERCHANT), created_at).with_expected_token("USDC", dec!(80));
    let mut indexer = MockIndexer::new();
    indexer.expect_fetch_transfers().returning(move |_| {
        Ok(vec![
            token_transfer('a', BUYER, SPLIT, "USDC", dec!(50), created_at + 60_000),
            token_transfer('b', BUYER, SPLIT, "USDC", dec!(80), created_at + 60_000),
        ])
    });
    let mut rates = MockRates::new();
    rates.expect_usd_price().returning(|_| Ok(dec!(1)));
    let mut db = MockReceiptStore::new();
    let candidates = vec![r1.clone(), r2.clone()];
    db.expect_fetch_receipts_created_between().times(1).returning(move |_, _, _| Ok(candidates.clone()));
    db.expect_fetch_receipt_for_transaction().times(2).returning(|_, _| Ok(None));
    db.expect_fetch_receipt().withf(|_, id| id == "R1").times(1).returning(move |_, _| Ok(Some(r1.clone())));
    db.expect_fetch_receipt().withf(|_, id| id == "R2").times(1).returning(move |_, _| Ok(Some(r2.clone())));
    db.expect_fetch_link().times(2).returning(|_| Ok(None));
    db.expect_upsert_receipt()
        .withf(|_, r| r.receipt_id == "R1")
        .times(1)
        .returning(|_, _| Err(RepositoryError::DatabaseError("disk I/O error".into())));
    db.expect_upsert_receipt().withf(|_, r| r.receipt_id == "R2").times(1).returning(|_, _| Ok(()));
    db.expect_upsert_link().withf(|link| link.id == "receipt_tx_link:R2").times(1).returning(|_| Ok(()));
    db.expect_record_audit_event().times(1).returning(|_| Ok(()));
    register(cfg, db, indexer, rates);
}
