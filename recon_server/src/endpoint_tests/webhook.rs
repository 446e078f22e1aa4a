use actix_web::{http::StatusCode, web, web::ServiceConfig};
use recon_engine::{traits::TransactionSourceError, ReconciliationApi, TransactionsApi};

use super::{
    helpers::{post_request, post_request_with_correlation_id, tx_hash, MERCHANT, SPLIT},
    mocks::{MockIndexer, MockRates, MockReceiptStore},
};
use crate::routes::SplitWebhookRoute;

fn register(cfg: &mut ServiceConfig, indexer: MockIndexer) {
    let api = ReconciliationApi::new(MockReceiptStore::new(), TransactionsApi::new(indexer, None), MockRates::new());
    cfg.service(SplitWebhookRoute::<MockReceiptStore, MockIndexer, MockRates>::new()).app_data(web::Data::new(api));
}

fn configure_untouched(cfg: &mut ServiceConfig) {
    register(cfg, MockIndexer::new());
}

fn configure_no_payments(cfg: &mut ServiceConfig) {
    let mut indexer = MockIndexer::new();
    indexer.expect_fetch_transfers().times(1).returning(|_| Ok(vec![]));
    register(cfg, indexer);
}

fn configure_indexer_down(cfg: &mut ServiceConfig) {
    let mut indexer = MockIndexer::new();
    indexer.expect_fetch_transfers().returning(|_| Err(TransactionSourceError::RequestFailed("refused".into())));
    register(cfg, indexer);
}

#[actix_web::test]
async fn addresses_are_validated() {
    let _ = env_logger::try_init().ok();
    let res = post_request("/webhook/split", "", configure_untouched).await.unwrap();
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json(), serde_json::json!({ "ok": false, "error": "invalid_split_address" }));

    let body = serde_json::json!({ "splitAddress": SPLIT, "merchantWallet": "merchant" }).to_string();
    let res = post_request("/webhook/split", &body, configure_untouched).await.unwrap();
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json(), serde_json::json!({ "ok": false, "error": "invalid_merchant_wallet" }));
}

#[actix_web::test]
async fn targeted_webhook_reports_the_reconciliation() {
    let _ = env_logger::try_init().ok();
    let hash = tx_hash('f').to_string();
    let body = serde_json::json!({
        "splitAddress": SPLIT,
        "merchantWallet": MERCHANT,
        "trigger": "payment",
        "txHashes": [hash, "0xdeadbeef"],
    })
    .to_string();
    let res = post_request_with_correlation_id("/webhook/split", &body, "hook-1", configure_no_payments).await.unwrap();
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.correlation_id.as_deref(), Some("hook-1"));
    assert_eq!(
        res.json(),
        serde_json::json!({
            "ok": true,
            "trigger": "payment",
            "reconcile": { "ok": true, "reconciled": 0, "unmatched": [hash] },
        })
    );
}

#[actix_web::test]
async fn scan_webhook_uses_the_default_trigger() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "splitAddress": SPLIT, "merchantWallet": MERCHANT }).to_string();
    let res = post_request("/webhook/split", &body, configure_no_payments).await.unwrap();
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(
        res.json(),
        serde_json::json!({ "ok": true, "trigger": "manual", "reconcile": { "ok": true, "reconciled": 0 } })
    );
}

#[actix_web::test]
async fn reconciliation_failures_are_reported_in_the_body() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "splitAddress": SPLIT, "merchantWallet": MERCHANT }).to_string();
    let res = post_request("/webhook/split", &body, configure_indexer_down).await.unwrap();
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["reconcile"], serde_json::json!({ "ok": false, "error": "failed_to_fetch_transactions" }));
}
