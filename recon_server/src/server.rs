use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use recon_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    BlockscoutClient,
    CoinbaseRateOracle,
    ReconciliationApi,
    SqliteDatabase,
    TransactionsApi,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    middleware::CorrelationIdMiddlewareFactory,
    routes::{health, ReconcileRoute, SplitWebhookRoute, TransactionsRoute},
};

const MAX_DB_CONNECTIONS: u32 = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, MAX_DB_CONNECTIONS)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if config.run_migrations {
        info!("🗃️ Running database migrations on {}", db.url());
        db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    } else {
        info!("🗃️ Database migrations are disabled. Assuming the schema at {} is up to date", db.url());
    }
    let source = BlockscoutClient::new(config.indexer.blockscout_config())
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let oracle = CoinbaseRateOracle::new(&config.rates.url, config.rates.timeout)
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(config.event_buffer_size, create_event_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, source, oracle, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    source: BlockscoutClient,
    oracle: CoinbaseRateOracle,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let ledger = TransactionsApi::new(source.clone(), config.platform_wallet.clone())
            .with_timeout(config.indexer.timeout);
        let recon_ledger = TransactionsApi::new(source.clone(), config.platform_wallet.clone())
            .with_timeout(config.indexer.timeout);
        let recon_api = ReconciliationApi::new(db.clone(), recon_ledger, oracle.clone())
            .with_producers(producers.clone())
            .with_rates_timeout(config.rates.timeout);
        App::new()
            .wrap(CorrelationIdMiddlewareFactory::new())
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U %{x-correlation-id}o").log_target("recon::access_log"))
            .app_data(web::Data::new(recon_api))
            .app_data(web::Data::new(ledger))
            .service(health)
            .service(ReconcileRoute::<SqliteDatabase, BlockscoutClient, CoinbaseRateOracle>::new())
            .service(SplitWebhookRoute::<SqliteDatabase, BlockscoutClient, CoinbaseRateOracle>::new())
            .service(TransactionsRoute::<BlockscoutClient>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

/// Subscribers to engine events. For now, reconciled receipts are written to the log.
pub fn create_event_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_receipt_reconciled(|ev| {
        Box::pin(async move {
            info!(
                "🪝️ [{}] Receipt {} of merchant {} was settled by {} ({} {}, matched on {})",
                ev.correlation_id,
                ev.receipt.receipt_id,
                ev.merchant,
                ev.transaction.hash,
                ev.transaction.value,
                ev.transaction.token,
                ev.strategy
            );
        })
    });
    hooks
}
