//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use recon_common::EvmAddress;
use recon_engine::{
    recon_objects::ReconcileParams,
    traits::{RateOracle, ReceiptRepository, TransactionSource},
    ReconcileError,
    ReconciliationApi,
    TransactionsApi,
};

use crate::{
    data_objects::{
        ReconcileResponse,
        TransactionsQuery,
        TransactionsResponse,
        WebhookParams,
        WebhookReconcileSummary,
        WebhookResponse,
    },
    errors::ServerError,
    helpers::lenient_json_body,
    middleware::CorrelationId,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// ---------------------------------------------   Reconcile  --------------------------------------------------
route!(reconcile => Post "/reconcile" impl ReceiptRepository, TransactionSource, RateOracle);
/// Matches payments into the merchant's split contract against the merchant's open receipts.
///
/// The body is
/// `{ merchantWallet, splitAddress?, txHashes?, timeWindowMs?, tolerancePct?, receiptId?, correlationId? }`.
/// When `txHashes` is given, only those transactions are considered, and the ones that could not be reconciled are
/// returned in `unmatched`.
pub async fn reconcile<B, S, R>(
    correlation_id: CorrelationId,
    body: web::Bytes,
    api: web::Data<ReconciliationApi<B, S, R>>,
) -> Result<HttpResponse, ServerError>
where
    B: ReceiptRepository,
    S: TransactionSource,
    R: RateOracle,
{
    let params = lenient_json_body::<ReconcileParams>(&body);
    trace!("💻️ [{correlation_id}] Received reconcile request for {}", params.merchant_wallet);
    let request = params.into_request(correlation_id.as_str()).map_err(|e| {
        debug!("💻️ [{correlation_id}] Rejecting reconcile request. {e}");
        e
    })?;
    let result = api.reconcile(request).await?;
    Ok(HttpResponse::Ok().json(ReconcileResponse::new(result)))
}

// --------------------------------------------   Transactions  ------------------------------------------------
route!(transactions => Get "/transactions" impl TransactionSource);
/// The classified transactions of a split contract, newest first, with cumulative per-token totals.
///
/// Query parameters: `splitAddress` (required), `merchantWallet` (used to tell releases from payments) and `limit`
/// (1 to 100, default 50). The totals always cover the full history, whatever the limit.
pub async fn transactions<S>(
    correlation_id: CorrelationId,
    query: web::Query<TransactionsQuery>,
    api: web::Data<TransactionsApi<S>>,
) -> Result<HttpResponse, ServerError>
where
    S: TransactionSource,
{
    let query = query.into_inner();
    let raw_split = query.split_address.clone().unwrap_or_default();
    let split = raw_split.parse::<EvmAddress>().map_err(|_| ReconcileError::InvalidSplitAddress(raw_split))?;
    trace!("💻️ [{correlation_id}] Received transactions request for {split}");
    let merchant = query.merchant();
    let mut history = api.fetch_history(&split, merchant.as_ref()).await.map_err(|e| {
        warn!("💻️ [{correlation_id}] Could not fetch the transactions for {split}. {e}");
        e
    })?;
    history.truncate(query.limit());
    Ok(HttpResponse::Ok().json(TransactionsResponse::new(history)))
}

// ----------------------------------------------   Webhook  ---------------------------------------------------
route!(split_webhook => Post "/webhook/split" impl ReceiptRepository, TransactionSource, RateOracle);
/// Called by the split indexer when it has seen new activity on a split contract. Runs a reconciliation for the
/// merchant, targeted at `txHashes` when they are supplied.
///
/// Address validation failures are reported as errors. The outcome of the reconciliation itself is reported in the
/// `reconcile` field of a successful response.
pub async fn split_webhook<B, S, R>(
    correlation_id: CorrelationId,
    body: web::Bytes,
    api: web::Data<ReconciliationApi<B, S, R>>,
) -> Result<HttpResponse, ServerError>
where
    B: ReceiptRepository,
    S: TransactionSource,
    R: RateOracle,
{
    let params = lenient_json_body::<WebhookParams>(&body);
    let trigger = params.trigger();
    info!("💻️ [{correlation_id}] Split webhook for merchant {}, trigger: {trigger}", params.merchant_wallet);
    let request = params.into_request(correlation_id.as_str())?;
    let outcome = api.reconcile(request).await;
    if let Err(e) = &outcome {
        warn!("💻️ [{correlation_id}] Reconciliation after the split webhook failed. {e}");
    }
    let response = WebhookResponse { ok: true, trigger, reconcile: WebhookReconcileSummary::from(outcome) };
    Ok(HttpResponse::Ok().json(response))
}
