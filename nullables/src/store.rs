//! Nullable store: thread-safe in-memory [`WalletStore`] for testing.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tessera_store::{
    AccountRecord, AccountStore, MetaStore, OutputFilter, OutputRecord, OutputStore, SpentMark,
    StoreError, SyncBatch, TransactionFilter, TransactionRecord, TransactionStore, WalletStore,
};
use tessera_types::{OutputId, TransactionId};

#[derive(Clone, Default)]
struct Inner {
    accounts: BTreeMap<u32, AccountRecord>,
    unspent: BTreeMap<(u32, OutputId), OutputRecord>,
    spent: BTreeMap<(u32, OutputId), OutputRecord>,
    transactions: BTreeMap<(u32, TransactionId), TransactionRecord>,
    meta: HashMap<String, Vec<u8>>,
}

impl Inner {
    fn apply(&mut self, account: u32, batch: &SyncBatch) -> Result<(), StoreError> {
        if let Some(record) = &batch.account {
            self.accounts.insert(record.index, record.clone());
        }
        for output in &batch.upsert_outputs {
            let key = (account, output.output_id);
            if self.spent.contains_key(&key) {
                continue;
            }
            if output.is_spent {
                self.unspent.remove(&key);
                self.spent.insert(key, output.clone());
            } else {
                self.unspent.insert(key, output.clone());
            }
        }
        for SpentMark { output_id, spent_by } in &batch.spent_outputs {
            let key = (account, *output_id);
            if self.spent.contains_key(&key) {
                continue;
            }
            let mut record = self
                .unspent
                .remove(&key)
                .ok_or_else(|| StoreError::NotFound(format!("output {}", output_id)))?;
            record.is_spent = true;
            record.spent_by = Some(*spent_by);
            self.spent.insert(key, record);
        }
        for tx in &batch.transactions {
            self.transactions.insert((account, tx.transaction_id), tx.clone());
        }
        Ok(())
    }
}

/// In-memory wallet store. Batches are staged on a copy and swapped in, so a
/// failing batch leaves no trace.
#[derive(Default)]
pub struct NullStore {
    inner: Mutex<Inner>,
    /// Counts down to an injected batch failure; zero when none is armed.
    fail_in: AtomicU64,
    batches_applied: AtomicU64,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `apply_batch` fail with a backend error.
    pub fn fail_next_batch(&self) {
        self.fail_batch_after(0);
    }

    /// Let `succeeding` more batches commit, then fail the one after.
    pub fn fail_batch_after(&self, succeeding: u64) {
        self.fail_in.store(succeeding + 1, Ordering::SeqCst);
    }

    /// Number of batches committed so far.
    pub fn batches_applied(&self) -> u64 {
        self.batches_applied.load(Ordering::SeqCst)
    }
}

impl AccountStore for NullStore {
    fn put_account(&self, record: &AccountRecord) -> Result<(), StoreError> {
        self.inner.lock().unwrap().accounts.insert(record.index, record.clone());
        Ok(())
    }

    fn get_account(&self, index: u32) -> Result<AccountRecord, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .accounts
            .get(&index)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("account {}", index)))
    }

    fn account_exists(&self, index: u32) -> Result<bool, StoreError> {
        Ok(self.inner.lock().unwrap().accounts.contains_key(&index))
    }

    fn iter_accounts(&self) -> Result<Vec<AccountRecord>, StoreError> {
        Ok(self.inner.lock().unwrap().accounts.values().cloned().collect())
    }
}

impl OutputStore for NullStore {
    fn get_output(&self, account: u32, output_id: &OutputId) -> Result<OutputRecord, StoreError> {
        let inner = self.inner.lock().unwrap();
        let key = (account, *output_id);
        inner
            .unspent
            .get(&key)
            .or_else(|| inner.spent.get(&key))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("output {}", output_id)))
    }

    fn upsert_output(&self, account: u32, record: &OutputRecord) -> Result<(), StoreError> {
        let batch = SyncBatch {
            upsert_outputs: vec![record.clone()],
            ..SyncBatch::default()
        };
        self.apply_batch(account, &batch)
    }

    fn mark_output_spent(
        &self,
        account: u32,
        output_id: &OutputId,
        spent_by: TransactionId,
    ) -> Result<(), StoreError> {
        let batch = SyncBatch {
            spent_outputs: vec![SpentMark {
                output_id: *output_id,
                spent_by,
            }],
            ..SyncBatch::default()
        };
        self.apply_batch(account, &batch)
    }

    fn get_outputs(&self, account: u32, filter: &OutputFilter) -> Result<Vec<OutputRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut out: Vec<OutputRecord> = inner
            .unspent
            .iter()
            .chain(inner.spent.iter())
            .filter(|((a, _), record)| *a == account && filter.matches(record))
            .map(|(_, record)| record.clone())
            .collect();
        out.sort_by_key(|r| r.output_id);
        Ok(out)
    }
}

impl TransactionStore for NullStore {
    fn get_transaction(
        &self,
        account: u32,
        transaction_id: &TransactionId,
    ) -> Result<TransactionRecord, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .transactions
            .get(&(account, *transaction_id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("transaction {}", transaction_id)))
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
        let inner = self.inner.lock().unwrap();
        let mut out: Vec<TransactionRecord> = inner
            .transactions
            .iter()
            .filter(|((a, _), record)| *a == account && filter.matches(record))
            .map(|(_, record)| record.clone())
            .collect();
        out.sort_by_key(|t| (t.timestamp, t.transaction_id));
        Ok(out)
    }
}

impl MetaStore for NullStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.inner.lock().unwrap().meta.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .meta
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("meta key '{}'", key)))
    }

    fn delete_meta(&self, key: &str) -> Result<(), StoreError> {
        self.inner.lock().unwrap().meta.remove(key);
        Ok(())
    }

    fn get_schema_version(&self) -> Result<u32, StoreError> {
        match self.try_get_meta("schema_version")? {
            Some(bytes) => {
                let arr: [u8; 4] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| StoreError::Corruption("schema_version length".into()))?;
                Ok(u32::from_le_bytes(arr))
            }
            None => Ok(0),
        }
    }

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError> {
        self.put_meta("schema_version", &version.to_le_bytes())
    }
}

impl WalletStore for NullStore {
    fn apply_batch(&self, account: u32, batch: &SyncBatch) -> Result<(), StoreError> {
        let countdown = self
            .fail_in
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .unwrap_or(0);
        if countdown == 1 {
            return Err(StoreError::Backend("injected batch failure".into()));
        }
        let mut inner = self.inner.lock().unwrap();
        batch.validate(
            |id| Ok(inner.transactions.contains_key(&(account, *id))),
            |id| Ok(inner.unspent.contains_key(&(account, *id))),
        )?;
        let mut staged = (*inner).clone();
        staged.apply(account, batch)?;
        *inner = staged;
        self.batches_applied.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove_account_data(&self, account: u32) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.accounts.remove(&account);
        inner.unspent.retain(|(a, _), _| *a != account);
        inner.spent.retain(|(a, _), _| *a != account);
        inner.transactions.retain(|(a, _), _| *a != account);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::{Address, BasicOutput, Output, Timestamp};

    fn output(n: u8) -> OutputRecord {
        OutputRecord {
            output_id: OutputId::new(TransactionId::new([n; 32]), 0),
            output: Output::Basic(BasicOutput::new(1_000_000, Address::Ed25519([1; 32]))),
            address: Address::Ed25519([1; 32]),
            chain: None,
            is_spent: false,
            spent_by: None,
            remainder: false,
            network_id: 1,
            booked_at: Timestamp::new(0),
        }
    }

    #[test]
    fn injected_failure_leaves_store_untouched() {
        let store = NullStore::new();
        store.fail_next_batch();
        assert!(store.upsert_output(0, &output(1)).is_err());
        assert!(store.get_outputs(0, &OutputFilter::all()).unwrap().is_empty());
        store.upsert_output(0, &output(1)).unwrap();
        assert_eq!(store.batches_applied(), 1);
    }

    #[test]
    fn delayed_failure_hits_the_chosen_batch() {
        let store = NullStore::new();
        store.fail_batch_after(1);
        store.upsert_output(0, &output(1)).unwrap();
        assert!(store.upsert_output(0, &output(2)).is_err());
        store.upsert_output(0, &output(3)).unwrap();
        assert_eq!(store.batches_applied(), 2);
    }

    #[test]
    fn unrecorded_spender_rejects_whole_batch() {
        let store = NullStore::new();
        let batch = SyncBatch {
            upsert_outputs: vec![output(1)],
            spent_outputs: vec![SpentMark {
                output_id: output(2).output_id,
                spent_by: TransactionId::new([9; 32]),
            }],
            ..SyncBatch::default()
        };
        assert!(store.apply_batch(0, &batch).is_err());
        assert!(store.get_outputs(0, &OutputFilter::all()).unwrap().is_empty());
    }

    #[test]
    fn accounts_are_ordered_by_index() {
        let store = NullStore::new();
        store.put_account(&AccountRecord::new(2, "b".into(), 1)).unwrap();
        store.put_account(&AccountRecord::new(0, "a".into(), 1)).unwrap();
        let indices: Vec<u32> = store.iter_accounts().unwrap().iter().map(|a| a.index).collect();
        assert_eq!(indices, vec![0, 2]);
    }
}
