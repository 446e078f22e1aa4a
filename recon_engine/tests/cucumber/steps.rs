use cucumber::{given, then, when};
use recon_engine::{
    chain_types::{ObservedTransfer, TransferKind, NATIVE_TOKEN},
    db_types::{MerchantConfig, Receipt, ReceiptStatus},
    recon_objects::{ReconcileOptions, ReconcileRequest},
    traits::ReceiptRepository,
};
use rust_decimal::Decimal;

use crate::cucumber::{
    world::{at_minute, merchant, split, tx_hash, wallet},
    ReconWorld,
};

fn amount(s: &str) -> Decimal {
    s.parse().expect("Not a valid amount")
}

#[given("the merchant has configured their split contract")]
async fn configure_split(world: &mut ReconWorld) {
    let db = &world.system().db;
    db.upsert_merchant_config(&merchant(), &MerchantConfig::with_split_address(&split()))
        .await
        .expect("Error saving site config");
}

#[given(expr = "receipt {word} expecting {word} {word} created at minute {int}")]
async fn token_receipt(world: &mut ReconWorld, id: String, value: String, token: String, minute: i64) {
    let receipt = Receipt::new(id, &merchant(), at_minute(minute)).with_expected_token(token, amount(&value));
    save_receipt(world, receipt).await;
}

#[given(expr = "receipt {word} expecting ${word} created at minute {int}")]
async fn usd_receipt(world: &mut ReconWorld, id: String, value: String, minute: i64) {
    let receipt = Receipt::new(id, &merchant(), at_minute(minute)).with_expected_usd(amount(&value));
    save_receipt(world, receipt).await;
}

#[given(expr = "receipt {word} for buyer {word} created at minute {int}")]
async fn buyer_receipt(world: &mut ReconWorld, id: String, buyer: String, minute: i64) {
    let receipt = Receipt::new(id, &merchant(), at_minute(minute)).with_buyer(&wallet(&buyer));
    save_receipt(world, receipt).await;
}

#[given(expr = "receipt {word} has status {word}")]
async fn receipt_status(world: &mut ReconWorld, id: String, status: String) {
    let receipt = fetch_receipt(world, &id).await.with_status(ReceiptStatus::from(status.as_str()));
    save_receipt(world, receipt).await;
}

async fn save_receipt(world: &mut ReconWorld, receipt: Receipt) {
    world.system().db.upsert_receipt(&merchant(), &receipt).await.expect("Error saving receipt");
}

async fn fetch_receipt(world: &mut ReconWorld, id: &str) -> Receipt {
    world
        .system()
        .db
        .fetch_receipt(&merchant(), id)
        .await
        .expect("Error fetching receipt")
        .unwrap_or_else(|| panic!("Receipt {id} does not exist"))
}

#[given(expr = "a payment [{word}] of {word} {word} from {word} at minute {int}")]
async fn payment(world: &mut ReconWorld, alias: String, value: String, token: String, from: String, minute: i64) {
    let kind = if token == NATIVE_TOKEN { TransferKind::Native } else { TransferKind::Token };
    world.system().transfers.push(ObservedTransfer {
        hash: tx_hash(&alias),
        kind,
        from: wallet(&from),
        to: split(),
        value: amount(&value),
        token,
        timestamp: at_minute(minute),
        block_number: 1,
        status: "ok".into(),
    });
}

#[given(expr = "the price of {word} is ${word}")]
async fn price(world: &mut ReconWorld, token: String, value: String) {
    let sys = world.system();
    sys.oracle = sys.oracle.clone().with_price(&token, amount(&value));
}

#[when(expr = "I reconcile payment [{word}]")]
async fn reconcile_one(world: &mut ReconWorld, alias: String) {
    let request = ReconcileRequest::targeted(merchant(), Some(split()), vec![tx_hash(&alias)], "cucumber".into());
    world.system().run(request).await;
}

#[when(expr = "I reconcile payments [{word}] and [{word}]")]
async fn reconcile_two(world: &mut ReconWorld, a: String, b: String) {
    let hashes = vec![tx_hash(&a), tx_hash(&b)];
    let request = ReconcileRequest::targeted(merchant(), Some(split()), hashes, "cucumber".into());
    world.system().run(request).await;
}

#[when(expr = "I reconcile payment [{word}] against receipt {word}")]
async fn reconcile_pinned(world: &mut ReconWorld, alias: String, receipt_id: String) {
    let request = ReconcileRequest::targeted(merchant(), Some(split()), vec![tx_hash(&alias)], "cucumber".into())
        .with_receipt_id(receipt_id);
    world.system().run(request).await;
}

#[when(expr = "I reconcile payment [{word}] with a tolerance of {int}%")]
async fn reconcile_with_tolerance(world: &mut ReconWorld, alias: String, pct: i64) {
    let options = ReconcileOptions::new(None, Some(Decimal::from(pct)));
    let request = ReconcileRequest::targeted(merchant(), Some(split()), vec![tx_hash(&alias)], "cucumber".into())
        .with_options(options);
    world.system().run(request).await;
}

#[when("I scan for payments")]
async fn scan(world: &mut ReconWorld) {
    let request = ReconcileRequest::scan(merchant(), None, "cucumber".into());
    world.system().run(request).await;
}

#[then(expr = "{int} receipt(s) is/are reconciled")]
async fn reconciled_count(world: &mut ReconWorld, count: usize) {
    assert_eq!(world.system().result().reconciled, count, "Unexpected number of reconciled receipts");
}

#[then("no payments are unmatched")]
async fn none_unmatched(world: &mut ReconWorld) {
    assert_eq!(world.system().result().unmatched, Some(vec![]));
}

#[then(expr = "payment [{word}] is unmatched")]
async fn unmatched(world: &mut ReconWorld, alias: String) {
    let unmatched = world.system().result().unmatched.clone().unwrap_or_default();
    assert!(unmatched.contains(&tx_hash(&alias)), "{alias} is not in the unmatched list: {unmatched:?}");
}

#[then("the unmatched list is not reported")]
async fn unmatched_absent(world: &mut ReconWorld) {
    assert_eq!(world.system().result().unmatched, None);
}

#[then(expr = "receipt {word} is linked to payment [{word}]")]
async fn linked(world: &mut ReconWorld, id: String, alias: String) {
    let receipt = fetch_receipt(world, &id).await;
    assert_eq!(receipt.status, Some(ReceiptStatus::Reconciled));
    assert_eq!(receipt.linked_hash(), Some(tx_hash(&alias)));
    let link = world.system().db.fetch_link(&id).await.expect("Error fetching link").expect("No link document");
    assert_eq!(link.claimed_hash(), Some(tx_hash(&alias)));
}

#[then(expr = "receipt {word} has buyer {word}")]
async fn buyer(world: &mut ReconWorld, id: String, alias: String) {
    let receipt = fetch_receipt(world, &id).await;
    assert_eq!(receipt.buyer(), Some(wallet(&alias)));
}

#[then(expr = "receipt {word} is still open")]
async fn still_open(world: &mut ReconWorld, id: String) {
    let receipt = fetch_receipt(world, &id).await;
    assert_ne!(receipt.status, Some(ReceiptStatus::Reconciled));
    assert!(receipt.linked_hash().is_none());
    let link = world.system().db.fetch_link(&id).await.expect("Error fetching link");
    assert!(link.is_none(), "Receipt {id} has a link document");
}

#[then(expr = "the run fails with {word}")]
async fn run_fails(world: &mut ReconWorld, code: String) {
    match &world.system().last_result {
        Some(Err(e)) => assert_eq!(e.code(), code),
        other => panic!("Expected the run to fail with {code}, got {other:?}"),
    }
}
