//! LMDB implementation of TransactionStore.

use tessera_store::{StoreError, SyncBatch, TransactionFilter, TransactionRecord, TransactionStore, WalletStore};
use tessera_types::TransactionId;

use crate::store::LmdbWalletStore;
use crate::{account_key, scoped_key, LmdbError};

impl TransactionStore for LmdbWalletStore {
    fn get_transaction(
        &self,
        account: u32,
        transaction_id: &TransactionId,
    ) -> Result<TransactionRecord, StoreError> {
        let rtxn = self.env.env().read_txn().map_err(LmdbError::from)?;
        let bytes = self
            .env
            .transactions_db
            .get(&rtxn, &scoped_key(account, transaction_id.as_bytes()))
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("transaction {}", transaction_id)))?;
        Ok(bincode::deserialize(bytes).map_err(LmdbError::from)?)
    }

    fn append_transaction(&self, account: u32, record: &TransactionRecord) -> Result<(), StoreError> {
        let batch = SyncBatch {
            transactions: vec![record.clone()],
            ..SyncBatch::default()
        };
        self.apply_batch(account, &batch)
    }

    fn get_transactions(
        &self,
        account: u32,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let rtxn = self.env.env().read_txn().map_err(LmdbError::from)?;
        let mut out: Vec<TransactionRecord> = Vec::new();
        let iter = self
            .env
            .transactions_db
            .prefix_iter(&rtxn, &account_key(account))
            .map_err(LmdbError::from)?;
        for entry in iter {
            let (_, bytes) = entry.map_err(LmdbError::from)?;
            let record: TransactionRecord = bincode::deserialize(bytes).map_err(LmdbError::from)?;
            if filter.matches(&record) {
                out.push(record);
            }
        }
        out.sort_by_key(|t| (t.timestamp, t.transaction_id));
        Ok(out)
    }
}
