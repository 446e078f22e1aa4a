use std::fmt::Debug;

use log::*;
use recon_common::{EvmAddress, TxHash};
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;

use super::{db_url, documents, new_pool, SqliteDatabaseError};
use crate::{
    db_types::{
        AuditEvent,
        MerchantConfig,
        Receipt,
        ReceiptTxLink,
        AUDIT_DOC_TYPE,
        LINK_DOC_TYPE,
        RECEIPT_DOC_TYPE,
        SITE_CONFIG_DOC_TYPE,
        SITE_CONFIG_ID,
    },
    traits::{ReceiptRepository, RepositoryError},
};

const DEFAULT_MAX_CONNECTIONS: u32 = 25;

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using the URL in `RECON_DATABASE_URL`.
    pub async fn new() -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), DEFAULT_MAX_CONNECTIONS).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), SqliteDatabaseError> {
        sqlx::migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn save<T: Serialize>(
        &self,
        id: &str,
        partition: &str,
        doc_type: &str,
        created_at: Option<i64>,
        doc: &T,
    ) -> Result<(), SqliteDatabaseError> {
        let mut body =
            serde_json::to_value(doc).map_err(|e| SqliteDatabaseError::SerializationError(id.into(), e.to_string()))?;
        if let Value::Object(map) = &mut body {
            map.insert("id".into(), Value::String(id.to_string()));
            map.insert("type".into(), Value::String(doc_type.to_string()));
        }
        let mut conn = self.pool.acquire().await?;
        documents::upsert_document(id, partition, doc_type, created_at, &body, &mut conn).await
    }
}

impl ReceiptRepository for SqliteDatabase {
    async fn fetch_receipt(&self, merchant: &EvmAddress, receipt_id: &str) -> Result<Option<Receipt>, RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        let receipt = documents::fetch_document(&Receipt::document_id(receipt_id), merchant.as_str(), &mut conn).await?;
        Ok(receipt)
    }

    async fn fetch_receipts_created_between(
        &self,
        merchant: &EvmAddress,
        from: i64,
        to: i64,
    ) -> Result<Vec<Receipt>, RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        let receipts =
            documents::fetch_documents_created_between(RECEIPT_DOC_TYPE, merchant.as_str(), from, to, &mut conn).await?;
        trace!("🗃️ {} receipts created between {from} and {to} for {merchant}", receipts.len());
        Ok(receipts)
    }

    async fn fetch_receipt_for_transaction(
        &self,
        merchant: &EvmAddress,
        tx_hash: &TxHash,
    ) -> Result<Option<Receipt>, RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        let receipt = documents::find_document_by_field(
            RECEIPT_DOC_TYPE,
            merchant.as_str(),
            "$.transactionHash",
            tx_hash.as_str(),
            &mut conn,
        )
        .await?;
        Ok(receipt)
    }

    async fn upsert_receipt(&self, merchant: &EvmAddress, receipt: &Receipt) -> Result<(), RepositoryError> {
        let mut receipt = receipt.clone();
        receipt.wallet = merchant.to_string();
        let id = Receipt::document_id(&receipt.receipt_id);
        self.save(&id, merchant.as_str(), RECEIPT_DOC_TYPE, receipt.created_at, &receipt).await?;
        debug!("🗃️ Receipt {} saved for {merchant}", receipt.receipt_id);
        Ok(())
    }

    async fn fetch_link(&self, receipt_id: &str) -> Result<Option<ReceiptTxLink>, RepositoryError> {
        let id = ReceiptTxLink::link_id(receipt_id);
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        let link = documents::fetch_document(&id, &id, &mut conn).await?;
        Ok(link)
    }

    async fn upsert_link(&self, link: &ReceiptTxLink) -> Result<(), RepositoryError> {
        self.save(&link.id, &link.id, LINK_DOC_TYPE, Some(link.linked_at), link).await?;
        debug!("🗃️ Link {} saved", link.id);
        Ok(())
    }

    async fn fetch_merchant_config(&self, merchant: &EvmAddress) -> Result<Option<MerchantConfig>, RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        let config = documents::fetch_document(SITE_CONFIG_ID, merchant.as_str(), &mut conn).await?;
        Ok(config)
    }

    async fn upsert_merchant_config(
        &self,
        merchant: &EvmAddress,
        config: &MerchantConfig,
    ) -> Result<(), RepositoryError> {
        self.save(SITE_CONFIG_ID, merchant.as_str(), SITE_CONFIG_DOC_TYPE, None, config).await?;
        Ok(())
    }

    async fn record_audit_event(&self, event: &AuditEvent) -> Result<(), RepositoryError> {
        self.save(&event.id, &event.target, AUDIT_DOC_TYPE, Some(event.ts), event).await?;
        trace!("🗃️ Audit record {} ({}) saved", event.id, event.what);
        Ok(())
    }
}
