use actix_web::{
    body::MessageBody,
    http::{header::ContentType, StatusCode},
    test,
    test::TestRequest,
    web::ServiceConfig,
    App,
};
use chrono::Utc;
use log::debug;
use recon_common::{EvmAddress, TxHash};
use recon_engine::chain_types::{ObservedTransfer, TransferKind};
use rust_decimal::Decimal;

use crate::middleware::{CorrelationIdMiddlewareFactory, CORRELATION_ID_HEADER};

pub const SPLIT: &str = "0x5555555555555555555555555555555555555555";
pub const MERCHANT: &str = "0x1111111111111111111111111111111111111111";
pub const BUYER: &str = "0x2222222222222222222222222222222222222222";

pub struct TestResponse {
    pub status: StatusCode,
    pub correlation_id: Option<String>,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

pub async fn get_request(path: &str, configure: fn(&mut ServiceConfig)) -> Result<TestResponse, String> {
    call(TestRequest::get().uri(path), configure).await
}

pub async fn post_request(path: &str, body: &str, configure: fn(&mut ServiceConfig)) -> Result<TestResponse, String> {
    let req = TestRequest::post().uri(path).insert_header(ContentType::json()).set_payload(body.to_string());
    call(req, configure).await
}

pub async fn post_request_with_correlation_id(
    path: &str,
    body: &str,
    correlation_id: &str,
    configure: fn(&mut ServiceConfig),
) -> Result<TestResponse, String> {
    let req = TestRequest::post()
        .uri(path)
        .insert_header(ContentType::json())
        .insert_header((CORRELATION_ID_HEADER, correlation_id))
        .set_payload(body.to_string());
    call(req, configure).await
}

async fn call(req: TestRequest, configure: fn(&mut ServiceConfig)) -> Result<TestResponse, String> {
    let app = App::new().wrap(CorrelationIdMiddlewareFactory::new()).configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let (_, res) = test::try_call_service(&service, req.to_request()).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let correlation_id =
        res.headers().get(CORRELATION_ID_HEADER).and_then(|v| v.to_str().ok()).map(|s| s.to_string());
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok(TestResponse { status, correlation_id, body })
}

pub fn address(s: &str) -> EvmAddress {
    s.parse().unwrap()
}

pub fn tx_hash(c: char) -> TxHash {
    format!("0x{}", c.to_string().repeat(64)).parse().unwrap()
}

pub fn now() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn token_transfer(
    hash: char,
    from: &str,
    to: &str,
    token: &str,
    value: Decimal,
    timestamp: i64,
) -> ObservedTransfer {
    ObservedTransfer {
        hash: tx_hash(hash),
        kind: TransferKind::Token,
        from: address(from),
        to: address(to),
        value,
        token: token.to_string(),
        timestamp,
        block_number: 1_000,
        status: "ok".to_string(),
    }
}
