use actix_web::{http::StatusCode, web, web::ServiceConfig};
use recon_engine::{traits::TransactionSourceError, TransactionsApi};
use rust_decimal_macros::dec;

use super::{
    helpers::{get_request, token_transfer, BUYER, MERCHANT, SPLIT},
    mocks::MockIndexer,
};
use crate::routes::TransactionsRoute;

const T0: i64 = 1_700_000_000_000;

fn register(cfg: &mut ServiceConfig, indexer: MockIndexer) {
    cfg.service(TransactionsRoute::<MockIndexer>::new())
        .app_data(web::Data::new(TransactionsApi::new(indexer, None)));
}

#[actix_web::test]
async fn missing_split_address() {
    let _ = env_logger::try_init().ok();
    let res = get_request("/transactions", configure_untouched).await.unwrap();
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json(), serde_json::json!({ "ok": false, "error": "invalid_split_address" }));
    let res = get_request("/transactions?splitAddress=0x55", configure_untouched).await.unwrap();
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

fn configure_untouched(cfg: &mut ServiceConfig) {
    register(cfg, MockIndexer::new());
}

#[actix_web::test]
async fn indexer_failure() {
    let _ = env_logger::try_init().ok();
    let path = format!("/transactions?splitAddress={SPLIT}");
    let res = get_request(&path, configure_indexer_timeout).await.unwrap();
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.json(), serde_json::json!({ "ok": false, "error": "failed_to_fetch_transactions" }));
}

fn configure_indexer_timeout(cfg: &mut ServiceConfig) {
    let mut indexer = MockIndexer::new();
    indexer.expect_fetch_transfers().returning(|_| Err(TransactionSourceError::Timeout));
    register(cfg, indexer);
}

#[actix_web::test]
async fn history_is_classified_and_totalled() -> anyhow::Result<()> {
    let _ = env_logger::try_init().ok();
    let path = format!("/transactions?splitAddress={SPLIT}&merchantWallet={MERCHANT}&limit=2");
    let res = get_request(&path, configure_history).await.map_err(anyhow::Error::msg)?;
    assert_eq!(res.status, StatusCode::OK);
    let json = res.json();
    assert_eq!(json["ok"], true);
    let txs = json["transactions"].as_array().expect("transactions array");
    // Newest first, limited to two
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0]["type"], "release");
    assert_eq!(txs[0]["releaseType"], "merchant");
    assert_eq!(txs[1]["type"], "payment");
    assert_eq!(txs[1]["value"], 25.0);
    // Totals cover the full history
    assert_eq!(json["cumulative"]["payments"]["USDC"], 125.0);
    assert_eq!(json["cumulative"]["merchantReleases"]["USDC"], 97.0);
    assert_eq!(json["cumulative"]["platformReleases"], serde_json::json!({}));
    Ok(())
}

fn configure_history(cfg: &mut ServiceConfig) {
    let mut indexer = MockIndexer::new();
    indexer.expect_fetch_transfers().returning(|_| {
        Ok(vec![
            token_transfer('1', BUYER, SPLIT, "USDC", dec!(100), T0),
            token_transfer('2', BUYER, SPLIT, "USDC", dec!(25), T0 + 1_000),
            token_transfer('3', SPLIT, MERCHANT, "USDC", dec!(97), T0 + 2_000),
        ])
    });
    register(cfg, indexer);
}

#[actix_web::test]
async fn without_a_merchant_releases_are_not_typed() {
    let _ = env_logger::try_init().ok();
    let path = format!("/transactions?splitAddress={SPLIT}&merchantWallet=somebody");
    let res = get_request(&path, configure_history).await.unwrap();
    assert_eq!(res.status, StatusCode::OK);
    let json = res.json();
    assert_eq!(json["transactions"].as_array().map(|a| a.len()), Some(3));
    assert_eq!(json["transactions"][0]["type"], "release");
    assert!(json["transactions"][0].get("releaseType").is_none());
    assert_eq!(json["cumulative"]["merchantReleases"], serde_json::json!({}));
}
