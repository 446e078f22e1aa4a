use mockall::mock;
use recon_common::{EvmAddress, TxHash};
use recon_engine::{
    chain_types::ObservedTransfer,
    db_types::{AuditEvent, MerchantConfig, Receipt, ReceiptTxLink},
    traits::{
        RateOracle,
        RateOracleError,
        ReceiptRepository,
        RepositoryError,
        TransactionSource,
        TransactionSourceError,
    },
};
use rust_decimal::Decimal;

mock! {
    pub ReceiptStore {}
    impl ReceiptRepository for ReceiptStore {
        async fn fetch_receipt(&self, merchant: &EvmAddress, receipt_id: &str) -> Result<Option<Receipt>, RepositoryError>;
        async fn fetch_receipts_created_between(&self, merchant: &EvmAddress, from: i64, to: i64) -> Result<Vec<Receipt>, RepositoryError>;
        async fn fetch_receipt_for_transaction(&self, merchant: &EvmAddress, tx_hash: &TxHash) -> Result<Option<Receipt>, RepositoryError>;
        async fn upsert_receipt(&self, merchant: &EvmAddress, receipt: &Receipt) -> Result<(), RepositoryError>;
        async fn fetch_link(&self, receipt_id: &str) -> Result<Option<ReceiptTxLink>, RepositoryError>;
        async fn upsert_link(&self, link: &ReceiptTxLink) -> Result<(), RepositoryError>;
        async fn fetch_merchant_config(&self, merchant: &EvmAddress) -> Result<Option<MerchantConfig>, RepositoryError>;
        async fn upsert_merchant_config(&self, merchant: &EvmAddress, config: &MerchantConfig) -> Result<(), RepositoryError>;
        async fn record_audit_event(&self, event: &AuditEvent) -> Result<(), RepositoryError>;
    }
}

mock! {
    pub Indexer {}
    impl TransactionSource for Indexer {
        async fn fetch_transfers(&self, split: &EvmAddress) -> Result<Vec<ObservedTransfer>, TransactionSourceError>;
    }
}

mock! {
    pub Rates {}
    impl RateOracle for Rates {
        async fn usd_price(&self, symbol: &str) -> Result<Decimal, RateOracleError>;
    }
}
